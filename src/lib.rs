use clap::{Parser, Subcommand};
use std::process::ExitCode;

pub mod bindings;
pub mod capability;
pub mod config;
pub mod error;
pub mod heap;
pub mod memory;
pub mod native;
pub mod runtime;
pub mod value;

pub use config::RuntimeConfig;
pub use error::{RefError, Result};
pub use heap::Heap;
pub use memory::{GcHandleKind, Handle};
pub use runtime::{OwnerProxy, Runtime};
pub use value::{Buffer, HostObject, ObjectRef, Value};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Canonical managed buffers over raw native memory"
)]
pub struct Args {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the size of a primitive type, or of every type
    Sizeof { name: Option<String> },
    /// Print the alignment of a primitive type, or of every type
    Alignof { name: Option<String> },
    /// Print the full size and alignment table
    Table,
    /// Dump the bytes of an exported data symbol
    Peek {
        #[arg(short, long, value_name = "FOLDER", default_value = ".")]
        libraries: String,
        library: String,
        symbol: String,
        #[arg(default_value_t = 16)]
        len: usize,
    },
}

pub fn run_cli(args: Args) -> ExitCode {
    let result = match args.command {
        Command::Sizeof { name } => print_layouts(name.as_deref(), |l| l.size),
        Command::Alignof { name } => print_layouts(name.as_deref(), |l| l.align),
        Command::Table => {
            println!("{:<10} {:>5} {:>6}", "type", "size", "align");
            for (name, layout) in capability::table() {
                println!("{name:<10} {:>5} {:>6}", layout.size, layout.align);
            }
            println!("endianness: {}", capability::endianness());
            Ok(())
        }
        Command::Peek {
            libraries,
            library,
            symbol,
            len,
        } => peek(&libraries, &library, &symbol, len),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_layouts(name: Option<&str>, field: fn(&capability::Layout) -> usize) -> Result<()> {
    match name {
        Some(name) => {
            let layout = capability::Primitive::from_name(name)?.layout();
            println!("{}", field(&layout));
        }
        None => {
            for (name, layout) in capability::table() {
                println!("{name:<10} {}", field(layout));
            }
        }
    }
    Ok(())
}

fn peek(root: &str, library: &str, symbol: &str, len: usize) -> Result<()> {
    let mut libraries = native::NativeLibraries::new(root);
    let mut runtime = Runtime::from_env();
    runtime.mutate(|gc, heap| {
        // SAFETY: the symbol is trusted to name at least `len` readable bytes
        let buffer = unsafe { heap.wrap_symbol(gc, &mut libraries, library, symbol, len)? };
        println!("{library}::{symbol} @ 0x{}", heap.hex_address(gc, buffer, 0));
        for (i, chunk) in buffer.to_vec().chunks(16).enumerate() {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
            println!("{:08x}  {}", i * 16, hex.join(" "));
        }
        Ok(())
    })
}
