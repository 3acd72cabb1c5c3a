//! Subcommands and their execution against a [`MarketStore`].
//!
//! Every invocation restores the market from the store, performs one
//! operation and saves the resulting image only when the operation succeeded.

use crate::config::CliConfig;
use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use filemart_market::Market;
use filemart_storage::{export_snapshot, import_snapshot, MarketStore};
use filemart_types::{Amount, Identity};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Owner,
    Requester,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Register the caller as a data owner or data requester
    Register {
        role: RoleArg,
        #[arg(long = "as")]
        caller: Identity,
    },
    /// Show the role flags of an identity
    Role {
        #[arg(long = "as")]
        caller: Identity,
    },
    /// Register a file under the calling owner
    Add {
        #[arg(long = "as")]
        caller: Identity,
        #[arg(long)]
        locator: String,
        #[arg(long)]
        name: String,
    },
    /// Show an owner's files, subject to access rules
    Display {
        #[arg(long = "as")]
        caller: Identity,
        #[arg(long)]
        owner: Identity,
    },
    /// List every owner's file names
    ListFiles,
    /// Grant a requester access to the calling owner's files
    Allow {
        #[arg(long = "as")]
        caller: Identity,
        #[arg(long)]
        requester: Identity,
    },
    /// Revoke a requester's access
    Disallow {
        #[arg(long = "as")]
        caller: Identity,
        #[arg(long)]
        requester: Identity,
    },
    /// Requesters currently granted by the calling owner
    ShareAccess {
        #[arg(long = "as")]
        caller: Identity,
    },
    /// Owners that ever granted or revoked the caller, with current state
    AccessibleOwners {
        #[arg(long = "as")]
        caller: Identity,
    },
    /// List bids, optionally only those addressed to one owner
    Bids {
        #[arg(long)]
        owner: Option<Identity>,
    },
    /// Escrow value and place a bid for access
    PlaceBid {
        #[arg(long = "as")]
        caller: Identity,
        #[arg(long)]
        owner: Identity,
        #[arg(long)]
        amount: Amount,
        /// Value to escrow; defaults to the bid amount
        #[arg(long)]
        escrow: Option<Amount>,
    },
    /// Accept a bid, collecting the escrow and granting access
    AcceptBid {
        #[arg(long = "as")]
        caller: Identity,
        #[arg(long)]
        index: u64,
    },
    /// Withdraw an active bid and recover its escrow
    WithdrawBid {
        #[arg(long = "as")]
        caller: Identity,
        #[arg(long)]
        index: u64,
    },
    /// Credit an account (requires dev_faucet)
    Fund {
        #[arg(long)]
        to: Identity,
        #[arg(long)]
        amount: Amount,
    },
    /// Show an account balance
    Balance {
        #[arg(long = "of")]
        account: Identity,
    },
    /// Print the event journal
    Events {
        #[arg(long, default_value_t = 0)]
        since: u64,
    },
    /// Write snapshot.json and manifest.json into a directory
    Export {
        #[arg(long)]
        out: PathBuf,
    },
    /// Replace the stored market with an exported snapshot
    Import {
        #[arg(long)]
        from: PathBuf,
    },
}

impl Command {
    fn mutates(&self) -> bool {
        matches!(
            self,
            Command::Register { .. }
                | Command::Add { .. }
                | Command::Allow { .. }
                | Command::Disallow { .. }
                | Command::PlaceBid { .. }
                | Command::AcceptBid { .. }
                | Command::WithdrawBid { .. }
                | Command::Fund { .. }
        )
    }
}

fn restore_market<S: MarketStore>(store: &S, config: &CliConfig) -> Result<Market> {
    match store.load()? {
        Some(snapshot) => Market::restore(config.market.clone(), &snapshot)
            .context("stored market image is inconsistent"),
        None => Ok(Market::new(config.market.clone())),
    }
}

/// Pretty JSON for a command result. Amounts keep their full `u128` range.
fn render<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Run `command` and return its result as pretty-printed JSON.
pub fn execute<S: MarketStore>(store: &S, config: &CliConfig, command: Command) -> Result<String> {
    match command {
        Command::Events { since } => render(&store.events_since(since)?),
        Command::Import { from } => import(store, config, from),
        other => {
            let market = restore_market(store, config)?;
            let mutates = other.mutates();
            let output = run(&market, config, other)?;
            if mutates {
                store.save(&market.snapshot())?;
            }
            Ok(output)
        }
    }
}

#[derive(Serialize)]
struct BalanceView {
    account: Identity,
    balance: Amount,
}

#[derive(Serialize)]
struct PlacedBid {
    index: u64,
    escrow_balance: Amount,
}

#[derive(Serialize)]
struct Refund {
    index: u64,
    refund: Amount,
}

fn run(market: &Market, config: &CliConfig, command: Command) -> Result<String> {
    let output = match command {
        Command::Register { role, caller } => {
            match role {
                RoleArg::Owner => market.register_as_data_owner(&caller)?,
                RoleArg::Requester => market.register_as_data_requester(&caller)?,
            }
            render(&json!({ "identity": caller, "role": market.role_of(&caller) }))?
        }
        Command::Role { caller } => render(&market.get_role(&caller))?,
        Command::Add {
            caller,
            locator,
            name,
        } => {
            let position = market.add(&caller, locator, name)?;
            render(&json!({ "owner": caller, "position": position }))?
        }
        Command::Display { caller, owner } => render(&market.display(&caller, &owner)?)?,
        Command::ListFiles => render(&market.list_all_files())?,
        Command::Allow { caller, requester } => {
            market.allow(&caller, &requester)?;
            render(&json!({ "owner": caller, "requester": requester, "granted": true }))?
        }
        Command::Disallow { caller, requester } => {
            market.disallow(&caller, &requester)?;
            render(&json!({ "owner": caller, "requester": requester, "granted": false }))?
        }
        Command::ShareAccess { caller } => render(&market.share_access(&caller))?,
        Command::AccessibleOwners { caller } => {
            render(&market.get_accessible_data_owners(&caller))?
        }
        Command::Bids { owner } => {
            let bids = match owner {
                Some(owner) => market.bids_for_owner(&owner),
                None => market.get_bids(),
            };
            render(&bids)?
        }
        Command::PlaceBid {
            caller,
            owner,
            amount,
            escrow,
        } => {
            let index = market.place_bid(&caller, &owner, amount, escrow.unwrap_or(amount))?;
            render(&PlacedBid {
                index,
                escrow_balance: market.escrow_balance(),
            })?
        }
        Command::AcceptBid { caller, index } => render(&market.accept_bid(&caller, index)?)?,
        Command::WithdrawBid { caller, index } => {
            let refund = market.withdraw_bid(&caller, index)?;
            render(&Refund { index, refund })?
        }
        Command::Fund { to, amount } => {
            if !config.dev_faucet {
                anyhow::bail!("funding is disabled; set dev_faucet = true to enable it");
            }
            market.fund(&to, amount)?;
            render(&BalanceView {
                account: to,
                balance: market.balance_of(&to),
            })?
        }
        Command::Balance { account } => render(&BalanceView {
            account,
            balance: market.balance_of(&account),
        })?,
        Command::Export { out } => render(&export_snapshot(&market.snapshot(), &out)?)?,
        other @ (Command::Events { .. } | Command::Import { .. }) => {
            anyhow::bail!("{other:?} does not run against a restored market")
        }
    };
    Ok(output)
}

fn import<S: MarketStore>(store: &S, config: &CliConfig, from: PathBuf) -> Result<String> {
    let (manifest, snapshot) = import_snapshot(&from)?;
    // Reject images that do not restore before touching the store.
    Market::restore(config.market.clone(), &snapshot).context("imported snapshot is inconsistent")?;
    store.replace(&snapshot)?;
    tracing::info!(from = %from.display(), bids = manifest.bid_count, "market replaced from snapshot");
    render(&manifest)
}
