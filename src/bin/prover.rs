use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use zkp_group_membership::{
    config::Config, utils::field_to_hex, wallet::identity_from_private_key, CircuitKeys,
    MembershipGroup, ProofBundle, ProofEngine, TREE_DEPTH,
};

/// Proves group membership and binds the proof to a message.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "ZKP_PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    #[arg(short, long, default_value = "Hello world")]
    message: String,

    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(args.config.as_ref())?;
    let output = args.output.unwrap_or(config.proof.output_file);

    println!("Loading group from: {}", config.tree.state_file.display());
    if !config.tree.state_file.exists() {
        return Err(anyhow::anyhow!(
            "Group state file does not exist: {}. Register an identity first.",
            config.tree.state_file.display()
        ));
    }
    let group = MembershipGroup::open(&config.tree.state_file, TREE_DEPTH)
        .context("Failed to load group state")?;
    println!("Loaded {} members", group.len());

    println!("Deriving identity from wallet signature...");
    let identity = identity_from_private_key(&args.private_key)?;

    let leaf_index = group.index_of(identity.commitment()).with_context(|| {
        format!(
            "Identity commitment '{}' is not registered in '{}'. Run the register binary with this key first.",
            field_to_hex(identity.commitment()),
            config.tree.state_file.display()
        )
    })?;
    debug!("Identity found at leaf index {leaf_index}");

    println!("Generating Merkle proof...");
    let membership = group
        .prove_membership(leaf_index)
        .context("Failed to generate Merkle proof")?;
    println!("Merkle root: {}", field_to_hex(membership.root));

    println!("Generating ZK-SNARK keys...");
    let keys = Arc::new(CircuitKeys::generate().context("Failed to generate circuit keys")?);
    let engine = ProofEngine::new(keys);

    println!("Generating ZK proof (this may take a while)...");
    let (proof, signals) = engine
        .prove(&identity, &membership, args.message.as_bytes())
        .context("Failed to create proof")?;
    println!("ZK proof generated, size: {} bytes", proof.len());

    let bundle = ProofBundle::new(&proof, signals)?;
    let json_output =
        serde_json::to_string_pretty(&bundle).context("Failed to serialize proof to JSON")?;

    println!("Writing proof to: {}", output.display());
    fs::write(&output, json_output).context("Failed to write proof file")?;
    info!("Proof written to {}", output.display());

    println!("Proof successfully generated and saved!");
    println!("Merkle Root: {}", field_to_hex(signals.root));
    println!("Nullifier Hash: {}", field_to_hex(signals.nullifier_hash));

    Ok(())
}
