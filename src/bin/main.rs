//! Keywallet CLI - exercises the wallet core against live endpoints.
//!
//! Wallet commands:
//!   keywallet init --spend-key <hex> [--view-key <hex>]
//!   keywallet status                  → daemon height / sync / network
//!   keywallet balance                 → wallet RPC, or fallback + height
//!   keywallet history                 → merged transfers, newest first
//!   keywallet fees                    → daemon fee estimate
//!   keywallet address [--rotation N] [--subaddress]
//!   keywallet send <address> <amount>
//!   keywallet uri <address> [--amount A] [--message M] | uri --parse <uri>
//!
//! Device commands:
//!   keywallet ports
//!   keywallet device <port> ping|status|addresses
//!   keywallet device <port> balance <amount>
//!   keywallet device <port> rotate <old-address> <new-address>
//!
//! Configuration flags (all commands):
//!   --daemon <url> --wallet-rpc <url> --rpc-user <u> --rpc-pass <p>
//!   --network <mainnet|testnet|stagenet> --app <name>

use std::collections::HashMap;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};

use keywallet::chain::SALVIUM;
use keywallet::device::{DeviceCallbacks, DeviceLink, SerialTransport, BAUD_RATE};
use keywallet::logging::init_logging;
use keywallet::store::FileStore;
use keywallet::wallet::{wallet_manager_for, Recipient, WalletConfig, WalletManager};
use keywallet::{AddressCodec, NetworkType, PaymentRequest, UnitConverter};

#[tokio::main]
async fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let opts = match ParsedArgs::parse(&args) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    if opts.command.is_none() {
        print_usage();
        return;
    }

    let result = run(&opts).await;
    match result {
        Ok(output) => {
            if std::io::stdout().is_terminal() {
                println!("{}", serde_json::to_string_pretty(&output).unwrap());
            } else {
                println!("{}", serde_json::to_string(&output).unwrap());
            }
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(opts: &ParsedArgs) -> Result<Value> {
    match opts.command.as_deref() {
        Some("init") => cmd_init(opts).await,
        Some("status") => cmd_status(opts).await,
        Some("balance") => cmd_balance(opts).await,
        Some("history") => cmd_history(opts).await,
        Some("fees") => cmd_fees(opts).await,
        Some("address") => cmd_address(opts).await,
        Some("send") => cmd_send(opts).await,
        Some("uri") => cmd_uri(opts),
        Some("ports") => cmd_ports(),
        Some("device") => cmd_device(opts).await,
        Some(cmd) => bail!("unknown command: {cmd}"),
        None => unreachable!(),
    }
}

fn manager(opts: &ParsedArgs) -> Result<Arc<dyn WalletManager>> {
    let app = opts.flag("app").unwrap_or("keywallet");
    let store = Arc::new(FileStore::open(app)?);

    let mut config = WalletConfig::new();
    if let Some(network) = opts.flag("network") {
        config.network = NetworkType::from_str(network)
            .ok_or_else(|| anyhow!("unknown network: {network}"))?;
    }
    if let Some(daemon) = opts.flag("daemon") {
        config.daemon_url = daemon.to_string();
    }
    if let Some(url) = opts.flag("wallet-rpc") {
        config = config.with_wallet_rpc(
            url,
            opts.flag("rpc-user").map(String::from),
            opts.flag("rpc-pass").map(String::from),
        );
    }

    Ok(wallet_manager_for("sal", config, store)?)
}

async fn cmd_init(opts: &ParsedArgs) -> Result<Value> {
    let spend_key = opts.flag("spend-key").context("--spend-key required")?;
    let wallet = manager(opts)?;
    let session = wallet.initialize(spend_key, opts.flag("view-key")).await?;
    Ok(json!({
        "primary_address": session.primary_address,
        "network": session.network.as_str(),
    }))
}

async fn cmd_status(opts: &ParsedArgs) -> Result<Value> {
    let wallet = manager(opts)?;
    Ok(serde_json::to_value(wallet.chain_status().await)?)
}

async fn cmd_balance(opts: &ParsedArgs) -> Result<Value> {
    let wallet = manager(opts)?;
    wallet.load_session().await?;
    let units = UnitConverter::new(SALVIUM);
    let balance = wallet.balance().await;
    Ok(json!({
        "total": units.format(balance.total_atomic),
        "unlocked": units.format(balance.unlocked_atomic),
        "sync_height": balance.sync_height,
        "authoritative": balance.authoritative,
    }))
}

async fn cmd_history(opts: &ParsedArgs) -> Result<Value> {
    let wallet = manager(opts)?;
    wallet.load_session().await?;
    let units = UnitConverter::new(SALVIUM);
    let transfers: Vec<Value> = wallet
        .history()
        .await
        .iter()
        .map(|tx| {
            let date = chrono::DateTime::from_timestamp(tx.timestamp as i64, 0)
                .map(|d| d.to_rfc3339());
            json!({
                "txid": tx.txid,
                "direction": tx.direction,
                "status": tx.status,
                "amount": units.format(tx.amount_atomic),
                "fee": units.format(tx.fee_atomic),
                "height": tx.height,
                "confirmations": tx.confirmations,
                "date": date,
                "payment_id": tx.payment_id,
            })
        })
        .collect();
    Ok(json!({ "count": transfers.len(), "transfers": transfers }))
}

async fn cmd_fees(opts: &ParsedArgs) -> Result<Value> {
    let wallet = manager(opts)?;
    let estimate = wallet.fee_estimate().await;
    let units = UnitConverter::new(SALVIUM);
    Ok(json!({
        "fee": units.format(estimate.fee as u128),
        "fees": estimate.fees.iter().map(|f| units.format(*f as u128)).collect::<Vec<_>>(),
        "quantization_mask": estimate.quantization_mask,
        "status": estimate.status,
    }))
}

async fn cmd_address(opts: &ParsedArgs) -> Result<Value> {
    let wallet = manager(opts)?;
    if !wallet.load_session().await? {
        bail!("no wallet session; run `keywallet init` first");
    }
    let rotation: u32 = match opts.flag("rotation") {
        Some(raw) => raw.parse().context("--rotation must be a number")?,
        None => 0,
    };
    let prefer_integrated = !opts.has_flag("subaddress");
    let address = wallet.receive_address(rotation, prefer_integrated).await?;
    Ok(json!({ "address": address, "rotation": rotation }))
}

async fn cmd_send(opts: &ParsedArgs) -> Result<Value> {
    let [address, amount] = opts.positionals() else {
        bail!("usage: keywallet send <address> <amount>");
    };
    let wallet = manager(opts)?;
    wallet.load_session().await?;
    let receipt = wallet
        .send(&[Recipient {
            address: address.clone(),
            amount: amount.clone(),
        }])
        .await?;
    let units = UnitConverter::new(SALVIUM);
    Ok(json!({
        "tx_hash": receipt.tx_hash,
        "fee": units.format(receipt.fee_atomic),
        "tx_key": receipt.tx_key,
    }))
}

fn cmd_uri(opts: &ParsedArgs) -> Result<Value> {
    let codec = AddressCodec::new(SALVIUM);
    if let Some(raw) = opts.flag("parse") {
        let parsed = codec.parse_uri(raw)?;
        return Ok(json!({
            "address": parsed.address,
            "amount": parsed.amount,
            "message": parsed.message,
            "payment_id": parsed.payment_id,
        }));
    }

    let [address] = opts.positionals() else {
        bail!("usage: keywallet uri <address> [--amount A] [--message M]");
    };
    let uri = codec.build_uri(&PaymentRequest {
        address: address.clone(),
        amount: opts.flag("amount").map(String::from),
        message: opts.flag("message").map(String::from),
        payment_id: opts.flag("payment-id").map(String::from),
    });
    Ok(json!({ "uri": uri }))
}

fn cmd_ports() -> Result<Value> {
    Ok(json!({ "ports": SerialTransport::available_ports()? }))
}

async fn cmd_device(opts: &ParsedArgs) -> Result<Value> {
    let positionals = opts.positionals();
    let (port, action) = match positionals {
        [port, action, ..] => (port, action.as_str()),
        _ => bail!("usage: keywallet device <port> <action> [args]"),
    };

    let callbacks = DeviceCallbacks::new()
        .on_connected(|| println!("{}", json!({"event": "connected"})))
        .on_address(|coin, address| {
            println!("{}", json!({"event": "address", "coin": coin, "address": address}))
        })
        .on_status(|status| println!("{}", json!({"event": "status", "status": status})))
        .on_rotation_complete(|ok| {
            println!("{}", json!({"event": "rotation_complete", "success": ok}))
        })
        .on_signature(|hex| println!("{}", json!({"event": "signature", "signature": hex})));

    let transport = SerialTransport::open(port, BAUD_RATE)?;
    let link = DeviceLink::connect(transport, callbacks).await?;

    match (action, &positionals[2..]) {
        ("ping", _) => {} // connect already pinged
        ("status", _) => link.request_status().await?,
        ("addresses", _) => link.request_addresses().await?,
        ("balance", [amount]) => link.update_balance(SALVIUM.ticker, amount).await?,
        ("rotate", [old, new]) => link.rotate_key(SALVIUM.ticker, old, new).await?,
        ("sign", [data]) => link.sign_transaction(SALVIUM.ticker, data).await?,
        _ => {
            link.disconnect().await;
            bail!("unknown device action: {action}");
        }
    }

    // Replies are asynchronous; give the device a moment before teardown.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let confirmed = link.is_confirmed();
    link.disconnect().await;
    Ok(json!({ "port": port, "action": action, "confirmed": confirmed }))
}

struct ParsedArgs {
    command: Option<String>,
    positionals: Vec<String>,
    flags: HashMap<String, String>,
    switches: Vec<String>,
}

impl ParsedArgs {
    /// `--key value` flags, `--key` switches, everything else positional.
    fn parse(args: &[String]) -> Result<Self> {
        const SWITCHES: &[&str] = &["subaddress"];

        let mut command = None;
        let mut positionals = Vec::new();
        let mut flags = HashMap::new();
        let mut switches = Vec::new();

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if let Some(name) = arg.strip_prefix("--") {
                if SWITCHES.contains(&name) {
                    switches.push(name.to_string());
                } else {
                    let value = iter
                        .next()
                        .ok_or_else(|| anyhow!("--{name} requires a value"))?;
                    flags.insert(name.to_string(), value.clone());
                }
            } else if command.is_none() {
                command = Some(arg.clone());
            } else {
                positionals.push(arg.clone());
            }
        }

        Ok(Self {
            command,
            positionals,
            flags,
            switches,
        })
    }

    fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    fn has_flag(&self, name: &str) -> bool {
        self.switches.iter().any(|s| s == name)
    }

    fn positionals(&self) -> &[String] {
        &self.positionals
    }
}

fn print_usage() {
    println!(
        "keywallet - CryptoNote wallet client + hardware device link\n\n\
         Usage: keywallet <command> [flags]\n\n\
         Commands:\n\
           init --spend-key <hex> [--view-key <hex>]\n\
           status | balance | history | fees\n\
           address [--rotation N] [--subaddress]\n\
           send <address> <amount>\n\
           uri <address> [--amount A] [--message M] | uri --parse <uri>\n\
           ports | device <port> <ping|status|addresses|balance|rotate|sign>\n\n\
         Flags:\n\
           --daemon <url> --wallet-rpc <url> --rpc-user <u> --rpc-pass <p>\n\
           --network <mainnet|testnet|stagenet> --app <name>"
    );
}
