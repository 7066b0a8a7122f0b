use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context};
use colored::Colorize;
use osd_daemon::{OsdConfig, OsdServer, StoreBackend};
use osd_messenger::{Messenger, OsdClient};
use osd_protocol::result;
use osd_types::{ObjectId, Payload, PeerAddr, PeerId};
use serde_json::json;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args, format).await,
        Command::Ping(args) => cmd_ping(args, format).await,
        Command::Put(args) => cmd_put(args, format).await,
        Command::Get(args) => cmd_get(args, format).await,
        Command::Stat(args) => cmd_stat(args, format).await,
        Command::Rm(args) => cmd_rm(args, format).await,
        Command::Shutdown(args) => cmd_shutdown(args, format).await,
        Command::Config(args) => cmd_config(args, format),
    }
}

fn effective_config(args: &ServeArgs) -> anyhow::Result<OsdConfig> {
    let mut config = match &args.config {
        Some(path) => OsdConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => OsdConfig::default(),
    };
    if let Some(whoami) = args.whoami {
        config.whoami = whoami;
    }
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if args.memory {
        config.store = StoreBackend::Memory;
    }
    if !args.play_dead.is_empty() {
        config.play_dead = args.play_dead.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Accept a raw hex id, otherwise derive one from the name.
fn parse_object(object: &str) -> ObjectId {
    ObjectId::from_hex(object).unwrap_or_else(|_| ObjectId::from_name(object))
}

async fn connect(peer: &PeerArgs) -> anyhow::Result<OsdClient> {
    let client = OsdClient::connect(peer.addr, PeerAddr::new(PeerId(peer.id), 0))
        .await
        .with_context(|| format!("connecting to {}", peer.addr))?;
    Ok(client.with_timeout(Duration::from_secs(peer.timeout)))
}

fn check(op: &str, code: i64) -> anyhow::Result<()> {
    if result::is_success(code) {
        Ok(())
    } else {
        bail!("{op} failed: {} ({code})", result::describe(code))
    }
}

async fn cmd_serve(args: ServeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = effective_config(&args)?;
    let server = OsdServer::bind(&config).await?;
    let addr = server.local_addr();
    let handle = server.messenger();
    if format == OutputFormat::Text {
        println!(
            "{} osd.{} listening on {}",
            "✓".green().bold(),
            config.whoami,
            addr.to_string().bold()
        );
    }

    let mut serving = tokio::spawn(server.serve());
    let stats = tokio::select! {
        joined = &mut serving => joined??,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received");
            handle.shutdown();
            serving.await??
        }
    };

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "osd": config.whoami,
                "received": stats.received,
                "replied": stats.replied,
                "failed": stats.failed,
                "dropped": stats.dropped,
                "send_errors": stats.send_errors,
            })
        ),
        OutputFormat::Text => println!(
            "osd.{} stopped: {} received, {} replied, {} failed, {} dropped",
            config.whoami,
            stats.received,
            stats.replied.to_string().green(),
            stats.failed.to_string().red(),
            stats.dropped.to_string().yellow()
        ),
    }
    Ok(())
}

async fn cmd_ping(args: PeerArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut client = connect(&args).await?;
    let alive = client.ping().await?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "addr": args.addr.to_string(), "alive": alive })),
        OutputFormat::Text if alive => println!("{} {} is alive", "✓".green().bold(), args.addr),
        OutputFormat::Text => println!("{} {} did not answer", "✗".red().bold(), args.addr),
    }
    Ok(())
}

async fn cmd_put(args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let data = match (&args.file, &args.data) {
        (Some(path), _) => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?
        }
        (None, Some(data)) => data.clone().into_bytes(),
        (None, None) => bail!("nothing to write: pass --file or --data"),
    };
    let oid = parse_object(&args.object.object);
    let mut client = connect(&args.object.peer).await?;
    let reply = client.write(oid, args.offset, Payload::new(data)).await?;
    check("write", reply.result)?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "oid": oid.to_hex(), "offset": args.offset, "written": reply.result })
        ),
        OutputFormat::Text => println!(
            "{} wrote {} bytes to {} at offset {}",
            "✓".green().bold(),
            reply.result,
            oid.short_hex().yellow(),
            args.offset
        ),
    }
    Ok(())
}

async fn cmd_get(args: GetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let oid = parse_object(&args.object.object);
    let mut client = connect(&args.object.peer).await?;
    let length = match args.length {
        Some(length) => length,
        None => {
            let stat = client.stat(oid).await?;
            check("stat", stat.result)?;
            stat.size.saturating_sub(args.offset)
        }
    };
    let reply = client.read(oid, length, args.offset).await?;
    check("read", reply.result)?;

    if let Some(path) = &args.output {
        std::fs::write(path, reply.payload.as_slice())
            .with_context(|| format!("writing {}", path.display()))?;
    }
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "oid": oid.to_hex(),
                "offset": args.offset,
                "length": reply.length,
                "data": hex::encode(reply.payload.as_slice()),
            })
        ),
        OutputFormat::Text if args.output.is_some() => println!(
            "{} read {} bytes from {}",
            "✓".green().bold(),
            reply.length,
            oid.short_hex().yellow()
        ),
        OutputFormat::Text => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(reply.payload.as_slice())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

async fn cmd_stat(args: ObjectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let oid = parse_object(&args.object);
    let mut client = connect(&args.peer).await?;
    let reply = client.stat(oid).await?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "oid": oid.to_hex(),
                "result": reply.result,
                "exists": reply.is_success(),
                "size": reply.size,
            })
        ),
        OutputFormat::Text => {
            if reply.result == result::ENOENT {
                println!("{} {}: no such object", "✗".red(), args.object);
                return Ok(());
            }
            check("stat", reply.result)?;
            println!("Object {}", args.object.bold());
            println!("  id:   {}", oid.to_hex().dimmed());
            println!("  size: {} bytes", reply.size.to_string().cyan());
        }
    }
    Ok(())
}

async fn cmd_rm(args: ObjectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let oid = parse_object(&args.object);
    let mut client = connect(&args.peer).await?;
    let reply = client.delete(oid).await?;
    check("delete", reply.result)?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "oid": oid.to_hex(), "deleted": true })),
        OutputFormat::Text => println!("{} deleted {}", "✓".green().bold(), args.object.yellow()),
    }
    Ok(())
}

async fn cmd_shutdown(args: PeerArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut client = connect(&args).await?;
    client.shutdown_daemon().await?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "addr": args.addr.to_string(), "shutdown": true })),
        OutputFormat::Text => println!("Shutdown sent to {}", args.addr.to_string().bold()),
    }
    Ok(())
}

fn cmd_config(args: ServeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = effective_config(&args)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}
