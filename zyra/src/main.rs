//! # zyra
//!
//! File-based HTTP API testing: plain-text request files describe a call and the
//! assertions its response must satisfy.
//!
//! ```bash
//! zyra run api/                     # run every *.zyra file under api/
//! zyra run api/ --concurrent -c 8   # run them concurrently, 8 at a time
//! zyra list api/ --json             # show what would run
//! zyra tokens api/users/get.zyra    # dump the token stream of one file
//! ```
mod app;
mod list;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    app::App::new().run().await
}
