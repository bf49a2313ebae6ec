// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! Command-line surface for the client binary: `spec.md` §6 names `{host,
//! port}`; `method` and `params` are this crate's generalization of the
//! original `rpc_client::call<Ret>(name, args...)` template call, expressed
//! as a method name plus a JSON value per positional argument.

use clap::Parser;

/// One RPC round trip against a relay server.
#[derive(Parser, Debug)]
#[command(author, version, about = "One-shot client for the relay sentinel-framed RPC wire format")]
pub struct Cli {
    /// Server hostname or address.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port.
    #[arg(long, default_value_t = 9527)]
    pub port: u16,

    /// RPC method name.
    pub method: String,

    /// Parameters, each parsed as a JSON value (e.g. `5`, `"text"`, `[1,2]`).
    pub params: Vec<String>,
}
