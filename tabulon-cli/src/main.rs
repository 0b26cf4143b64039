/*!
  Binary for the CLI of tabulon: tbl
*/

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

pub mod cli;
pub mod error;

use std::{
    io::{BufWriter, Write},
    path::Path,
};

use clap::Parser;
use cli::{CliApp, Command, InputArgs};
use colored::Colorize;
use error::CliError;
use serde_json::json;
use tabulon_physical::{
    management::ByteSized,
    serialization::{TableFile, WriteOptions, CURRENT_VERSION},
    AnyColumn,
};

fn open(input: &InputArgs, verify: bool) -> Result<TableFile, CliError> {
    log::info!("Reading {} ...", input.file.display());
    TableFile::open(&input.file, &input.read_options(verify)).map_err(|error| CliError::Reading {
        filename: input.file.clone(),
        error,
    })
}

fn storage_kind(column: &AnyColumn) -> &'static str {
    if column.is_heap() {
        "heap"
    } else {
        "mapped"
    }
}

fn inspect(input: &InputArgs, as_json: bool) -> Result<(), CliError> {
    let table = open(input, true)?;
    let key = table.key_column();

    if as_json {
        let columns = table
            .columns()
            .iter()
            .map(|named| {
                json!({
                    "name": named.name,
                    "type": named.column.element_type().type_code(),
                    "rows": named.column.len(),
                    "nulls": named.column.null_count(),
                    "characteristics": named.column.characteristics().to_string(),
                    "bytes": named.column.size_bytes(),
                    "storage": storage_kind(&named.column),
                })
            })
            .collect::<Vec<_>>();
        let summary = json!({
            "version": table.version(),
            "key_column": key.map(|index| table.columns()[index].name.clone()),
            "columns": columns,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{} {}", "File:".bold(), input.file.display());
    println!("{} {}", "Format version:".bold(), table.version());
    match key {
        Some(index) => println!(
            "{} {} ({index})",
            "Key column:".bold(),
            table.columns()[index].name
        ),
        None => println!("{} none", "Key column:".bold()),
    }
    println!(
        "{} {} ({} bytes)",
        "Columns:".bold(),
        table.columns().len(),
        table.size_bytes()
    );

    for (index, named) in table.columns().iter().enumerate() {
        let marker = if key == Some(index) { "*" } else { " " };
        println!(
            " {marker} {:<16} {:<11} {:>10} rows {:>10} nulls  {:<23} {:>12} bytes  {}",
            named.name,
            named.column.element_type().to_string(),
            named.column.len(),
            named.column.null_count(),
            named.column.characteristics().to_string(),
            named.column.size_bytes(),
            storage_kind(&named.column)
        );
    }

    Ok(())
}

fn verify(input: &InputArgs) -> Result<(), CliError> {
    // checked column by column below
    let table = open(input, false)?;

    let mut violations = 0;
    for named in table.columns() {
        match named.column.verify_characteristics() {
            Ok(()) => println!(
                "{} {}: {}",
                "ok".green().bold(),
                named.name,
                named.column.characteristics()
            ),
            Err(error) => {
                violations += 1;
                println!("{} {}: {error}", "violated".red().bold(), named.name);
            }
        }
    }

    if violations > 0 {
        return Err(CliError::Verification { count: violations });
    }

    log::info!("All {} columns verified", table.columns().len());
    Ok(())
}

fn dump(
    input: &InputArgs,
    names: &[String],
    offset: usize,
    limit: Option<usize>,
) -> Result<(), CliError> {
    let table = open(input, true)?;

    let selected = if names.is_empty() {
        table.columns().iter().collect::<Vec<_>>()
    } else {
        names
            .iter()
            .map(|name| {
                table
                    .columns()
                    .iter()
                    .find(|named| &named.name == name)
                    .ok_or_else(|| CliError::UnknownColumn { name: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    let rows = selected
        .iter()
        .map(|named| named.column.len())
        .max()
        .unwrap_or(0);
    let end = limit.map_or(rows, |limit| offset.saturating_add(limit).min(rows));

    let mut out = BufWriter::new(std::io::stdout().lock());
    let header = selected
        .iter()
        .map(|named| named.name.as_str())
        .collect::<Vec<_>>();
    writeln!(out, "{}", header.join("\t"))?;

    for row in offset..end {
        let fields = selected
            .iter()
            .map(|named| {
                if row < named.column.len() {
                    named.column.display_value(row)
                } else {
                    String::new()
                }
            })
            .collect::<Vec<_>>();
        writeln!(out, "{}", fields.join("\t"))?;
    }
    out.flush()?;

    Ok(())
}

fn rewrite(
    input: &InputArgs,
    output: &Path,
    options: &WriteOptions,
    overwrite: bool,
) -> Result<(), CliError> {
    if output.exists() && !overwrite {
        return Err(CliError::OutputExists {
            filename: output.to_path_buf(),
        });
    }

    let table = open(input, true)?;
    if table.version() < CURRENT_VERSION {
        log::info!("Upgrading from format version {}", table.version());
    }

    log::info!("Writing {} ...", output.display());
    table
        .save(output, options)
        .map_err(|error| CliError::Writing {
            filename: output.to_path_buf(),
            error,
        })?;

    println!(
        "Rewrote {} columns to {}",
        table.columns().len().to_string().green().bold(),
        output.display()
    );
    Ok(())
}

fn run(cli: CliApp) -> Result<(), CliError> {
    match cli.command {
        Command::Inspect { input, json } => inspect(&input, json),
        Command::Verify { input } => verify(&input),
        Command::Dump {
            input,
            columns,
            offset,
            limit,
        } => dump(&input, &columns, offset, limit),
        Command::Rewrite {
            input,
            output,
            byte_order,
            chunk_size,
            overwrite,
        } => rewrite(
            &input,
            &output,
            &Command::write_options(byte_order, chunk_size),
            overwrite,
        ),
    }
}

fn main() {
    let cli = CliApp::parse();

    cli.logging.initialize_logging();
    log::info!("Version: {}", clap::crate_version!());
    log::debug!("Command: {:?}", cli.command);

    run(cli).unwrap_or_else(|err| {
        log::error!("{} {err}", "error:".red().bold());
        std::process::exit(1)
    })
}
