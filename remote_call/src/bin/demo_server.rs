// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

#[path = "demo/api.rs"]
mod api;

use clap::Parser;
use log::*;

use std::net::TcpListener;

use api::ITest;

#[derive(Default)]
struct CTest {
    label: String,
    counter: i32,
}

remote_call::remote_class! {
    impl ITest for CTest {
        fn Method1(&mut self) {
            self.counter += 1;
        }

        fn Method2(&mut self, s: &mut String, c: char) -> i32 {
            s.push(c);
            self.counter += 1;
            self.counter
        }

        fn Label(&mut self) -> String {
            self.label.clone()
        }
    }
}

fn register_api() {
    api::Func1::register(|s, c| {
        s.push(c);

        s.len() as i32
    });

    api::Func2::register(|v, abc| {
        v.push(abc);

        let mut total = 0;
        let mut joined = String::new();
        for el in v.iter() {
            total += el.n;
            joined.push_str(&el.s);
        }

        (total, joined)
    });

    api::Func3::register(|m| {
        m.clear();
        m.insert(1, "A".to_string());
        m.insert(2, "B".to_string());
    });

    api::TestClassFactory::register(|label| {
        CTest { label, counter: 0 }.export_reap_when_idle()
    });
}

/// Serve the demo API over TCP.
#[derive(Parser)]
struct Options {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:4217")]
    listen: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let options = Options::parse();

    register_api();

    let listener = TcpListener::bind(&options.listen)?;
    info!("serving the demo API on {}", options.listen);

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                std::thread::spawn(move || {
                    if let Err(e) = remote_call::stream::serve_connection(stream, None) {
                        warn!("connection ended with error: {e}");
                    }
                });
            }
            Err(e) => warn!("error accepting connection: {e}"),
        }
    }

    Ok(())
}
