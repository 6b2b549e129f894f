//! Shielded pool withdrawal prover
//!
//! Host process around `masp_core`:
//! 1. Reads withdrawal requests (JSON) from an argument or a file
//! 2. Runs the proof pipeline and prints the response JSON
//! 3. Verifies responses, writes keys and exports the EVM verifier
//!
//! Configuration is layered: defaults, then `MASP_*` environment variables, then flags.
//! Logs go to stderr; stdout only carries results.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use masp_core::crypto::field::to_decimal;
use masp_core::crypto::merkle::{root_from_path, Direction, MerklePath};
use masp_core::proof::export::{public_inputs_calldata, EvmProof, EvmVerifyingKey};
use masp_core::proof::KeyPair;
use masp_core::{
    AssetBinding, AssetRegistry, CircuitShape, DepositSecret, FieldElement, Groth16Backend, KeyStore, PoolConfig,
    WithdrawalPipeline, WithdrawalRequest, WithdrawalResponse,
};

#[derive(Parser)]
#[command(name = "masp")]
#[command(about = "Multi-asset shielded pool withdrawal prover")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Merkle tree depth
    #[arg(long, global = true)]
    depth: Option<usize>,

    /// Single-asset scheme: asset id and amount are not committed
    #[arg(long, global = true)]
    unbound: bool,

    /// Seed for reproducible key setup (testing only)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Directory holding pre-generated keys
    #[arg(long, global = true, env = "MASP_KEYS_DIR")]
    keys: Option<PathBuf>,
}

#[derive(Args)]
struct JsonInput {
    /// Inline JSON document
    json: Option<String>,

    /// Read the JSON document from a file
    #[arg(long, conflicts_with = "json")]
    file: Option<PathBuf>,
}

impl JsonInput {
    fn read(&self) -> anyhow::Result<String> {
        match (&self.json, &self.file) {
            (Some(json), _) => Ok(json.clone()),
            (None, Some(path)) => fs::read_to_string(path).with_context(|| format!("reading {}", path.display())),
            (None, None) => bail!("pass a JSON document or --file"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Prove a withdrawal request
    Prove(JsonInput),

    /// Verify a withdrawal response
    Verify(JsonInput),

    /// Prove and verify the built-in demonstration deposit
    Demo,

    /// Generate keys and write them to a directory
    Setup {
        #[arg(long)]
        out: PathBuf,
    },

    /// Write a Solidity verifier for the current keys
    ExportVerifier {
        #[arg(long)]
        out: PathBuf,

        /// Contract name
        #[arg(long, default_value = "WithdrawVerifier")]
        contract: String,
    },

    /// List known assets
    Assets,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Prove(input) => handle_prove(&config, cli.keys.as_deref(), &input.read()?),
        Commands::Verify(input) => handle_verify(&config, cli.keys.as_deref(), &input.read()?),
        Commands::Demo => handle_demo(&config, cli.keys.as_deref()),
        Commands::Setup { out } => handle_setup(&config, out),
        Commands::ExportVerifier { out, contract } => handle_export(&config, cli.keys.as_deref(), out, contract),
        Commands::Assets => handle_assets(),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<PoolConfig> {
    let mut config = PoolConfig::from_env()?;

    if let Some(depth) = cli.depth {
        config.tree_depth = depth;
    }
    if cli.unbound {
        config.asset_binding = AssetBinding::Unbound;
    }
    if cli.seed.is_some() {
        config.setup_seed = cli.seed;
    }

    config.validate()?;
    Ok(config)
}

fn key_file(dir: &Path, shape: CircuitShape, ext: &str) -> PathBuf {
    dir.join(format!("withdraw_d{}_{}.{}", shape.tree_depth, shape.asset_binding, ext))
}

/// Build a pipeline, preloading keys from `keys_dir` when given
fn build_pipeline(config: &PoolConfig, keys_dir: Option<&Path>) -> anyhow::Result<WithdrawalPipeline> {
    let store = Arc::new(KeyStore::new(Groth16Backend::from_seed(config.setup_seed)));

    if let Some(dir) = keys_dir {
        let shape = CircuitShape::from_config(config);
        let pk_path = key_file(dir, shape, "pk");
        let vk_path = key_file(dir, shape, "vk");

        let pk = fs::read(&pk_path).with_context(|| format!("reading {}", pk_path.display()))?;
        let vk = fs::read(&vk_path).with_context(|| format!("reading {}", vk_path.display()))?;

        store.insert(KeyPair::from_bytes(shape, &pk, &vk)?)?;
        info!("loaded keys for {} from {}", shape, dir.display());
    }

    Ok(WithdrawalPipeline::with_key_store(
        config.clone(),
        Arc::new(AssetRegistry::well_known()),
        store,
    )?)
}

fn print_response(response: &WithdrawalResponse) -> anyhow::Result<()> {
    println!("{}", response.to_json()?);
    Ok(())
}

fn handle_prove(config: &PoolConfig, keys: Option<&Path>, json: &str) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config, keys)?;
    let response = pipeline.run_json(json);
    print_response(&response)?;

    if !response.success {
        bail!("withdrawal proof failed");
    }
    Ok(())
}

fn handle_verify(config: &PoolConfig, keys: Option<&Path>, json: &str) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config, keys)?;
    let response = WithdrawalResponse::from_json(json)?;
    let valid = pipeline.verify_response(&response)?;

    println!("{}", serde_json::json!({ "valid": valid }));
    if !valid {
        bail!("proof is not valid");
    }
    Ok(())
}

fn handle_demo(config: &PoolConfig, keys: Option<&Path>) -> anyhow::Result<()> {
    if config.tree_depth != 3 {
        bail!("the demonstration deposit uses a depth 3 path, got --depth {}", config.tree_depth);
    }

    let registry = AssetRegistry::well_known();
    let eth = registry.by_symbol("ETH")?;
    let amount = eth.to_base_units("1")?;

    let deposit = DepositSecret::new(FieldElement::from(123u64), FieldElement::from(456u64), eth.id, amount);
    let siblings: Vec<FieldElement> = [789u64, 101112, 131415].iter().map(|s| FieldElement::from(*s)).collect();
    let path = MerklePath::new(siblings.clone(), vec![Direction::Left; 3], 3)?;

    info!(
        "demo deposit: {} {} (leaf {})",
        eth.from_base_units(&amount),
        eth.symbol,
        to_decimal(&deposit.commitment())
    );

    let pipeline = build_pipeline(config, keys)?;
    let note = masp_core::DepositNote::from_secret(&deposit, &eth.symbol);
    let request = note.into_request(&path);

    let proof = pipeline.prove_request(&request)?;
    let response = proof.to_response();
    print_response(&response)?;

    let valid = pipeline.verify_response(&response)?;
    info!("verification after serialization round-trip: {}", valid);

    let calldata = EvmProof::from_artifact(&proof.proof)?.to_calldata();
    info!("EVM calldata: proof={:?} input={:?}", calldata, public_inputs_calldata(&proof.public_inputs()));

    // Tampered sibling must fail at witness construction
    let mut tampered = request.clone();
    tampered.merkle_path[0] = "790".to_string();
    let expected_root = root_from_path(&deposit.commitment(), &siblings, path.directions());
    let tampered = tampered.with_root(&expected_root);

    let rejected = pipeline.run(&tampered);
    info!(
        "tampered path rejected: {} ({:?})",
        !rejected.success,
        rejected.error_kind
    );

    if !valid || rejected.success {
        bail!("demo did not behave as expected");
    }
    Ok(())
}

fn handle_setup(config: &PoolConfig, out: &Path) -> anyhow::Result<()> {
    let shape = CircuitShape::from_config(config);
    let store = KeyStore::new(Groth16Backend::from_seed(config.setup_seed));
    let keys = store.get_or_setup(shape)?;

    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;

    let pk_path = key_file(out, shape, "pk");
    let vk_path = key_file(out, shape, "vk");
    fs::write(&pk_path, keys.serialize_proving_key()?).with_context(|| format!("writing {}", pk_path.display()))?;
    fs::write(&vk_path, keys.serialize_verifying_key()?).with_context(|| format!("writing {}", vk_path.display()))?;

    info!("wrote keys for {} to {}", shape, out.display());
    Ok(())
}

fn handle_export(config: &PoolConfig, keys_dir: Option<&Path>, out: &Path, contract: &str) -> anyhow::Result<()> {
    // The contract must match keys a prover can use: loaded ones, or seeded ones it can regenerate
    let pipeline = build_pipeline(config, keys_dir)?;
    let keys = pipeline
        .key_store()
        .verifying_keys(pipeline.shape())
        .context("export-verifier needs --keys or --seed")?;

    let evm_vk = EvmVerifyingKey::from_vk(keys.raw_verifying_key());
    fs::write(out, evm_vk.to_solidity(contract)?).with_context(|| format!("writing {}", out.display()))?;

    info!(
        "wrote {} ({} public inputs) to {}",
        contract,
        evm_vk.public_input_count(),
        out.display()
    );
    Ok(())
}

fn handle_assets() -> anyhow::Result<()> {
    let registry = AssetRegistry::well_known();
    let assets: Vec<_> = registry
        .iter()
        .map(|a| {
            serde_json::json!({
                "id": to_decimal(&a.id),
                "symbol": a.symbol,
                "name": a.name,
                "decimals": a.decimals,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&assets)?);
    Ok(())
}
