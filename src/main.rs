//! # Voxel World Headless Driver
//!
//! Streams a world around a simulated observer and logs what happens.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run --release -- world.json
//! ```

fn main() {
    if let Err(error) = voxel_world::run() {
        log::error!("{error}");
        std::process::exit(1);
    }
}
