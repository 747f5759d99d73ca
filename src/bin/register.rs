use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use zkp_group_membership::{
    config::Config, utils::field_to_hex, wallet::identity_from_private_key, MembershipGroup,
    TREE_DEPTH,
};

/// Registers the identity controlled by a wallet key in the group.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "ZKP_PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(args.config.as_ref())?;

    println!("Deriving identity from wallet signature...");
    let identity = identity_from_private_key(&args.private_key)?;
    let commitment = identity.commitment();
    println!("Identity commitment: {}", field_to_hex(commitment));

    let group = MembershipGroup::open(&config.tree.state_file, TREE_DEPTH).with_context(|| {
        format!(
            "Failed to open group state: {}",
            config.tree.state_file.display()
        )
    })?;

    if let Some(index) = group.index_of(commitment) {
        println!("Identity already registered at index {index}");
        return Ok(());
    }

    let index = group
        .insert(commitment)
        .context("Failed to register identity")?;
    info!(
        "Registered identity at index {index} in {}",
        config.tree.state_file.display()
    );

    println!("Registered at index {index}");
    println!("Group size: {}", group.len());
    println!("Merkle Root: {}", field_to_hex(group.root()));

    Ok(())
}
