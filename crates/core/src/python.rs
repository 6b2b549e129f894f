//! Python bindings
//!
//! Thin wrappers over the pipeline and the hash scheme. Field elements cross the
//! boundary as decimal strings, requests and responses as JSON.

use std::sync::Arc;

use once_cell::sync::Lazy;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::assets::AssetRegistry;
use crate::config::PoolConfig;
use crate::crypto::field::{parse_decimal, parse_decimal_list, to_decimal};
use crate::crypto::{commit, nullifier_hash, poseidon_hash};
use crate::pipeline::{WithdrawalPipeline, WithdrawalResponse};
use crate::proof::SeededKeyStores;

/// Keys shared by every pipeline created from Python in this process, one store per setup seed
static KEY_STORES: Lazy<SeededKeyStores> = Lazy::new(SeededKeyStores::new);

fn pipeline(config_json: Option<&str>) -> PyResult<WithdrawalPipeline> {
    let config = match config_json {
        Some(json) => PoolConfig::from_json_str(json),
        None => PoolConfig::from_env(),
    }
    .map_err(|e| PyValueError::new_err(e.to_string()))?;

    let keys = KEY_STORES.for_seed(config.setup_seed);
    WithdrawalPipeline::with_key_store(config, Arc::new(AssetRegistry::well_known()), keys)
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Leaf commitment of a deposit
#[pyfunction]
fn generate_commitment(secret: &str, nullifier_seed: &str, asset_id: &str, amount: &str) -> PyResult<String> {
    let parse = |name: &str, value: &str| parse_decimal(name, value).map_err(|e| PyValueError::new_err(e.to_string()));

    Ok(to_decimal(&commit(
        &parse("secret", secret)?,
        &parse("nullifierSeed", nullifier_seed)?,
        &parse("assetId", asset_id)?,
        &parse("amount", amount)?,
    )))
}

/// Public nullifier hash of a deposit
#[pyfunction]
fn generate_nullifier_hash(nullifier_seed: &str, asset_id: &str) -> PyResult<String> {
    let seed = parse_decimal("nullifierSeed", nullifier_seed).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let asset = parse_decimal("assetId", asset_id).map_err(|e| PyValueError::new_err(e.to_string()))?;

    Ok(to_decimal(&nullifier_hash(&seed, &asset)))
}

/// Poseidon hash function (zkSNARK-friendly)
#[pyfunction(name = "poseidon_hash")]
fn py_poseidon_hash(inputs: Vec<String>) -> PyResult<String> {
    let inputs = parse_decimal_list("inputs", &inputs).map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(to_decimal(&poseidon_hash(&inputs)))
}

/// Prove a withdrawal; returns the response JSON, which reports failures itself
#[pyfunction]
#[pyo3(signature = (request_json, config_json = None))]
fn generate_proof(py: Python, request_json: &str, config_json: Option<&str>) -> PyResult<String> {
    let pipeline = pipeline(config_json)?;
    let response = py.allow_threads(|| pipeline.run_json(request_json));

    response
        .to_json()
        .map_err(|e| PyRuntimeError::new_err(format!("response serialization failed: {}", e)))
}

/// Verify a response JSON produced by `generate_proof`
#[pyfunction]
#[pyo3(signature = (response_json, config_json = None))]
fn verify_proof(py: Python, response_json: &str, config_json: Option<&str>) -> PyResult<bool> {
    let pipeline = pipeline(config_json)?;
    let response = WithdrawalResponse::from_json(response_json).map_err(|e| PyValueError::new_err(e.to_string()))?;

    py.allow_threads(|| pipeline.verify_response(&response))
        .map_err(|e| PyRuntimeError::new_err(format!("Proof verification failed: {}", e)))
}

/// Python module definition
#[pymodule]
fn _masp_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(generate_commitment, m)?)?;
    m.add_function(wrap_pyfunction!(generate_nullifier_hash, m)?)?;
    m.add_function(wrap_pyfunction!(py_poseidon_hash, m)?)?;
    m.add_function(wrap_pyfunction!(generate_proof, m)?)?;
    m.add_function(wrap_pyfunction!(verify_proof, m)?)?;

    // Add version
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
