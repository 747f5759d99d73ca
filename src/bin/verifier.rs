use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use zkp_group_membership::{
    config::{Config, ENV_MAX_PROOF_FILE_SIZE},
    utils::field_to_hex,
    CircuitKeys, MembershipGroup, NullifierRegistry, ProofBundle, Verifier, TREE_DEPTH,
};

/// Verifies a membership proof bundle and records its nullifier hash.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    proof_file: PathBuf,

    #[arg(short, long, default_value = "Hello world")]
    message: String,

    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(args.config.as_ref())?;

    if !args.proof_file.exists() {
        return Err(anyhow::anyhow!(
            "Proof file does not exist: {}",
            args.proof_file.display()
        ));
    }

    info!("Loading proof from: {}", args.proof_file.display());
    println!("Loading proof from: {}", args.proof_file.display());

    let metadata = fs::metadata(&args.proof_file).context("Failed to read proof file metadata")?;
    debug!("Proof file size: {} bytes", metadata.len());
    if metadata.len() > config.proof.max_file_size {
        return Err(anyhow::anyhow!(
            "Proof file too large: {} bytes (max {} bytes). This may indicate a corrupted or invalid proof file. Set {} to raise the limit.",
            metadata.len(),
            config.proof.max_file_size,
            ENV_MAX_PROOF_FILE_SIZE
        ));
    }

    let proof_content =
        fs::read_to_string(&args.proof_file).context("Failed to read proof file")?;

    println!("Parsing proof JSON...");
    let bundle: ProofBundle =
        serde_json::from_str(&proof_content).context("Failed to parse proof JSON")?;
    bundle
        .validate(&config.security, config.proof.max_zk_proof_size)
        .context("Proof validation failed. The proof structure is invalid.")?;
    info!("Proof validation passed");

    let proof = bundle.proof()?;
    println!("Proof details:");
    println!("  Merkle Root: {}", field_to_hex(bundle.public_signals.root));
    println!(
        "  Nullifier Hash: {}",
        field_to_hex(bundle.public_signals.nullifier_hash)
    );
    println!("  Timestamp: {}", bundle.timestamp);
    println!("  ZK Proof Size: {} bytes", proof.len());

    let group = MembershipGroup::open(&config.tree.state_file, TREE_DEPTH)
        .context("Failed to load group state")?;
    let registry = NullifierRegistry::open(&config.registry.nullifier_file).with_context(|| {
        format!(
            "Failed to open nullifier registry: {}",
            config.registry.nullifier_file.display()
        )
    })?;
    debug!("Nullifier file: {}", config.registry.nullifier_file.display());

    println!("Generating ZK-SNARK keys...");
    let keys = Arc::new(CircuitKeys::generate().context("Failed to generate verification keys")?);
    let verifier = Verifier::new(keys, Arc::new(registry));

    println!("Verifying ZK proof...");
    match verifier.verify(
        &proof,
        &bundle.public_signals,
        group.root(),
        args.message.as_bytes(),
    ) {
        Ok(()) => {
            info!("Proof verification PASSED");
            println!("\n✓ Proof verification PASSED!");
            println!("A registered member signalled: {}", args.message);
            println!(
                "\nNullifier recorded to: {}",
                config.registry.nullifier_file.display()
            );
            Ok(())
        }
        Err(e) => {
            error!("Proof verification FAILED [{}]: {e}", e.code());
            println!("\n✗ Proof verification FAILED!");
            println!("Error [{}]: {e}", e.code());
            Err(anyhow::anyhow!("Proof verification failed: {}", e.code()))
        }
    }
}
