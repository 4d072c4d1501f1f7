// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

//! Builds a well-formed harness input: a control block followed by an
//! optional decode payload. Handy for seeding a fuzz corpus with
//! inputs that get past setup and into the decode loop.

use std::error::Error;
use std::fs;

use clap::Parser;
use zerocopy::IntoBytes;

use veldis_harness::ControlBlock;

#[derive(Parser, Debug)]
struct CmdOptions {
    /// Machine mode selector (0 real, 1 protected, 2 compatibility, 3 long)
    #[arg(long, default_value_t = 3)]
    machine_mode: u32,

    /// Default address width in bits (16, 32 or 64)
    #[arg(long, default_value_t = 64)]
    address_width: u32,

    /// Formatter style selector (0 Intel, 1 AT&T)
    #[arg(long, default_value_t = 0)]
    style: u32,

    /// Decoder mode selector to enable; may be given more than once
    #[arg(long = "enable-mode", value_name = "MODE")]
    enable_modes: Vec<u32>,

    /// Formatter attribute assignment as INDEX=VALUE; may be given
    /// more than once
    #[arg(long = "attribute", value_name = "INDEX=VALUE", value_parser = parse_attribute)]
    attributes: Vec<(u32, u64)>,

    /// File whose contents become the decode payload
    #[arg(long)]
    payload: Option<String>,

    /// The file the assembled input is written to
    #[arg(short, long)]
    output: String,
}

fn parse_attribute(arg: &str) -> Result<(u32, u64), String> {
    let (index, value) = arg
        .split_once('=')
        .ok_or_else(|| String::from("expected INDEX=VALUE"))?;
    let index = index
        .parse()
        .map_err(|_| format!("bad attribute index '{index}'"))?;
    let value = value
        .parse()
        .map_err(|_| format!("bad attribute value '{value}'"))?;
    Ok((index, value))
}

fn build(options: &CmdOptions) -> Result<(), Box<dyn Error>> {
    let mut decoder_modes = [0u8; veldis::DECODER_MODE_COUNT];
    for &mode in &options.enable_modes {
        let slot = decoder_modes
            .get_mut(mode as usize)
            .ok_or_else(|| format!("decoder mode {mode} is out of range"))?;
        *slot = 1;
    }

    let mut formatter_attributes = [0u64; veldis::FORMATTER_ATTRIB_COUNT];
    for &(attrib, value) in &options.attributes {
        let slot = formatter_attributes
            .get_mut(attrib as usize)
            .ok_or_else(|| format!("formatter attribute {attrib} is out of range"))?;
        *slot = value;
    }

    let cb = ControlBlock {
        machine_mode: options.machine_mode,
        address_width: options.address_width,
        decoder_modes,
        formatter_style: options.style,
        formatter_attributes,
    };

    let mut out = Vec::with_capacity(ControlBlock::SIZE);
    out.extend_from_slice(cb.as_bytes());

    if let Some(path) = &options.payload {
        let payload = fs::read(path).map_err(|e| {
            eprintln!("Failed to read payload file {path}");
            e
        })?;
        out.extend_from_slice(&payload);
    }

    fs::write(&options.output, &out).map_err(|e| {
        eprintln!("Failed to write output file {}", options.output);
        e
    })?;

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let options = CmdOptions::parse();
    build(&options)
}
