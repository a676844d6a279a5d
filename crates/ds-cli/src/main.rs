//! dirsweep CLI
//!
//! Developer tool for inspecting blacklist exports and simulating the
//! fragmentation codec against the storage quotas.

use std::fs;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use ds_core::codec::{
    fragment_key, FRAGMENT_CHUNK, FRAGMENT_KEY_PREFIX, ITEM_QUOTA_BYTES, MAX_FRAGMENTS,
    QUOTA_SAFETY_MARGIN, UNFRAGMENTED_KEY,
};
use ds_core::{classify, decode, encode, Blacklist, EntryKind};

#[derive(Parser)]
#[command(name = "ds-cli")]
#[command(about = "dirsweep blacklist codec and inspection tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a blacklist entries file into its storage record
    Encode {
        /// Input entries JSON file (canonical or legacy wire shape)
        #[arg(short, long)]
        input: String,

        /// Output record file; stdout when omitted
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Decode a storage record back into canonical entries
    Decode {
        /// Input storage record JSON file
        #[arg(short, long)]
        input: String,
    },

    /// Inspect a storage record: keys, sizes, fragment layout
    Inspect {
        /// Input storage record JSON file
        #[arg(short, long)]
        input: String,
    },

    /// Classify a location path
    Classify {
        /// Path to classify, e.g. /directory/game/Chess
        path: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Encode { input, output } => cmd_encode(&input, output.as_deref()),
        Commands::Decode { input } => cmd_decode(&input),
        Commands::Inspect { input } => cmd_inspect(&input),
        Commands::Classify { path } => cmd_classify(&path),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn read_json(path: &str) -> Result<Value, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read '{path}': {e}"))?;
    serde_json::from_str(&content).map_err(|e| format!("Malformed JSON in '{path}': {e}"))
}

fn read_record(path: &str) -> Result<Map<String, Value>, String> {
    match read_json(path)? {
        Value::Object(map) => Ok(map),
        _ => Err(format!("'{path}' is not a JSON object")),
    }
}

fn cmd_encode(input: &str, output: Option<&str>) -> Result<(), String> {
    let entries = read_json(input)?;
    let blacklist = Blacklist::from_wire(&entries);
    let encoded = encode(&blacklist).map_err(|e| e.to_string())?;

    let record = Value::Object(encoded.items);
    let text = serde_json::to_string_pretty(&record).map_err(|e| e.to_string())?;
    match output {
        Some(path) => {
            fs::write(path, text).map_err(|e| format!("Failed to write '{path}': {e}"))?
        }
        None => println!("{text}"),
    }

    eprintln!("Entries:   {}", blacklist.len());
    if encoded.fragments == 0 {
        eprintln!("Layout:    unfragmented ({UNFRAGMENTED_KEY})");
    } else {
        eprintln!(
            "Layout:    {} fragments of up to {FRAGMENT_CHUNK} values (max {MAX_FRAGMENTS})",
            encoded.fragments
        );
    }
    Ok(())
}

fn cmd_decode(input: &str) -> Result<(), String> {
    let record = read_record(input)?;
    let blacklist = decode(&record);
    let entries = serde_json::to_string_pretty(&blacklist).map_err(|e| e.to_string())?;
    println!("{entries}");
    Ok(())
}

fn cmd_inspect(input: &str) -> Result<(), String> {
    let record = read_record(input)?;

    println!("Keys:      {}", record.len());
    let budget = ITEM_QUOTA_BYTES - QUOTA_SAFETY_MARGIN;
    for (key, value) in &record {
        let size = key.len() + value.to_string().len();
        let flag = if size > ITEM_QUOTA_BYTES {
            "  OVER QUOTA"
        } else if size > budget {
            "  over safety margin"
        } else {
            ""
        };
        println!("  {key}: {size} bytes{flag}");
    }

    let mut fragments = 0;
    while record.contains_key(&fragment_key(fragments)) {
        fragments += 1;
    }
    let stale: Vec<&String> = record
        .keys()
        .filter(|key| {
            key.strip_prefix(FRAGMENT_KEY_PREFIX)
                .and_then(|n| n.parse::<usize>().ok())
                .is_some_and(|n| n >= fragments)
        })
        .collect();

    if record.contains_key(UNFRAGMENTED_KEY) {
        println!("Layout:    unfragmented");
        if fragments > 0 {
            println!("           plus {fragments} fragment keys shadowed by {UNFRAGMENTED_KEY}");
        }
    } else if fragments > 0 {
        println!("Layout:    {fragments} fragments");
    } else {
        println!("Layout:    no blacklist keys");
    }
    if !stale.is_empty() {
        println!("Stale:     {} fragment keys past the first gap", stale.len());
    }

    let blacklist = decode(&record);
    println!("Entries:   {}", blacklist.len());
    for kind in EntryKind::ALL {
        println!("  {}: {}", kind.as_str(), blacklist.kind(kind).len());
    }
    Ok(())
}

fn cmd_classify(path: &str) -> Result<(), String> {
    match classify(path) {
        Some(page) => println!("{}", page.as_str()),
        None => println!("unsupported"),
    }
    Ok(())
}
