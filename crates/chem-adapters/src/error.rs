use chem_core::CoreError;
use chem_domain::DomainError;
use chem_policies::PolicyError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AdapterError {
    #[error("error del núcleo: {0}")]
    Core(#[from] CoreError),
    #[error("error de dominio: {0}")]
    Domain(#[from] DomainError),
    #[error("error de política: {0}")]
    Policy(#[from] PolicyError),
    #[error("la reacción tiene {expected} reactivos pero se dieron {given} listas de monómeros")]
    ReactantMismatch { expected: usize, given: usize },
}
