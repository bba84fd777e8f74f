#![forbid(unsafe_code)]

use mimalloc_safe::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub use librarian_cli as lib;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    match lib::cli::run().await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            if let Some(err) = e.downcast_ref::<librarian_core::error::LibrarianError>() {
                eprintln!("librarian: {err}");
                std::process::exit(err.exit_code());
            } else {
                eprintln!("librarian: {e:#}");
                std::process::exit(1);
            }
        }
    }
}
