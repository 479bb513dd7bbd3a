// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

#[path = "demo/api.rs"]
mod api;

use clap::Parser;

use std::collections::BTreeMap;
use std::net::TcpStream;

use remote_call::stream::StreamTransport;
use remote_call::Transport;

use api::Abc;

/// Exercise the demo API against a running demo_server.
#[derive(Parser)]
struct Options {
    /// Address of the server.
    #[arg(long, default_value = "127.0.0.1:4217")]
    connect: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let options = Options::parse();

    let stream = TcpStream::connect(&options.connect)?;
    let mut transport =
        StreamTransport::with_client_id(stream, format!("demo-client-{}", std::process::id()));

    let mut s = String::from("ABC");
    let len = transport.call(api::Func1::args(&mut s, '!'))?;
    println!("Func1 -> {len}, s = {s:?}");

    let mut v = vec![
        Abc { s: "X".into(), n: 1 },
        Abc { s: "Y".into(), n: 2 },
    ];
    let (total, joined) = transport.call(api::Func2::args(&mut v, Abc { s: "Z".into(), n: 3 }))?;
    println!("Func2 -> ({total}, {joined:?}), v now has {} entries", v.len());

    let mut m = BTreeMap::new();
    transport.call(api::Func3::args(&mut m))?;
    println!("Func3 -> m = {m:?}");

    let test = transport.call(api::TestClassFactory::args("demo".to_string()))?;
    println!("created instance {}", test.instance_id());

    transport.call(test.Method1())?;
    transport.call(test.Method1())?;

    let mut text = String::from("abc");
    let count = transport.call(test.Method2(&mut text, '!'))?;
    println!("Method2 -> {count}, text = {text:?}");

    let label = transport.call(test.Label())?;
    println!("Label -> {label:?}");

    transport.call(test.destroy())?;
    println!("instance destroyed");

    Ok(())
}
