//! `rowscope operators` command implementation.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use rowscope_condition::{
    ConditionOperator, DATETIME_DEFAULT, LIST_DEFAULT, OperatorSpec, ParameterType,
    RANGE_DEFAULT, SCALAR_DEFAULT, SCALAR_NUMBER, SCALAR_STRING,
};

pub fn parse_parameter_type(s: &str) -> Result<ParameterType, String> {
    match s.to_ascii_lowercase().as_str() {
        "scalar" => Ok(ParameterType::Scalar),
        "list" => Ok(ParameterType::List),
        "range" => Ok(ParameterType::Range),
        "datetime" => Ok(ParameterType::Datetime),
        "none" => Ok(ParameterType::None),
        _ => Err(format!("unknown parameter type '{}'", s)),
    }
}

/// Operator catalog as served to clients.
#[derive(Debug, Serialize)]
pub struct OperatorCatalog {
    pub operators: Vec<OperatorSpec>,
    pub groups: BTreeMap<&'static str, Vec<&'static str>>,
}

pub fn catalog(parameter_type: Option<ParameterType>) -> OperatorCatalog {
    let operators = ConditionOperator::ALL
        .iter()
        .filter(|op| parameter_type.is_none_or(|pt| op.parameter_type() == pt))
        .map(|op| op.spec())
        .collect();

    let groups = [
        ("SCALAR_DEFAULT", SCALAR_DEFAULT),
        ("SCALAR_STRING", SCALAR_STRING),
        ("SCALAR_NUMBER", SCALAR_NUMBER),
        ("DATETIME_DEFAULT", DATETIME_DEFAULT),
        ("LIST_DEFAULT", LIST_DEFAULT),
        ("RANGE_DEFAULT", RANGE_DEFAULT),
    ]
    .into_iter()
    .map(|(name, group)| (name, group.iter().map(|op| op.code()).collect()))
    .collect();

    OperatorCatalog { operators, groups }
}

pub fn run(parameter_type: Option<ParameterType>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&catalog(parameter_type))?);
    Ok(())
}
