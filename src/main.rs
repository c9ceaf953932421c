//! Thin entry point. Config loading, the web/status surface, and the CLI
//! that drives them are out of scope for this crate (see `lib.rs`); this
//! binary only exists to initialize logging, report version info, and run
//! the in-memory demonstration harness (`demo.rs`) when invoked directly
//! rather than embedded in a master process.

use std::env;

use builder_dispatch::demo;

pub fn main() {
    let exit_code = main_inner();
    std::process::exit(exit_code);
}

fn main_inner() -> i32 {
    env_logger::init();

    if let Some(first_arg) = env::args().nth(1) {
        return match first_arg.as_str() {
            "--version" | "-V" => {
                println!("builder-dispatch {}", env!("CARGO_PKG_VERSION"));
                0
            }
            "--help" | "-h" => {
                println!("{}", help());
                0
            }
            "--demo" => {
                let runtime = match tokio::runtime::Runtime::new() {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        eprintln!("failed to start tokio runtime: {}", err);
                        return 1;
                    }
                };
                runtime.block_on(demo::run());
                0
            }
            unknown => {
                eprintln!("Unknown argument '{}'. Supported arguments:\n{}", unknown, help());
                101
            }
        };
    }

    println!("{}", help());
    0
}

fn help() -> &'static str {
    r#"
    builder-dispatch is a library crate: embed `builder_dispatch::Builder`
    in a master process wired up with a request store, build store, worker
    registry, message queue, and status sink.

    --version or -V to print the version
    --demo to run a small in-memory demonstration of one dispatch cycle
    --help or -h for this message
    "#
}
