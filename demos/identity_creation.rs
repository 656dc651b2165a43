//! # Identity Creation Example
//!
//! Demonstrates generating a brand new SQRL identity, deriving its
//! identity-lock keys, saving it under a password and rescue code, and
//! reloading it from the saved container.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example identity_creation
//! ```

use sqrl_identity_core::codec::rescue_code;
use sqrl_identity_core::keyschedule;
use sqrl_identity_core::{KeySlot, User, UserOptions};

fn main() {
    println!("=== SQRL Identity Core: Identity Creation Example ===\n");

    println!("Step 1: Generating new identity...");
    let (user, rescue_code_buf) =
        User::generate(UserOptions::default()).expect("failed to generate identity");
    println!("  Identity generated.");
    println!("  MemLocked: {}", user.mem_locked());
    println!();

    println!("Step 2: Rescue Code (write this down, shown only once!)");
    println!("  ┌────────────────────────────────────────────────────────┐");
    println!("  │ SECURITY WARNING: this is the only way to recover your │");
    println!("  │ identity if the password is lost. Never store it      │");
    println!("  │ digitally next to the identity file.                  │");
    println!("  └────────────────────────────────────────────────────────┘");
    println!("  {}", rescue_code::format_for_display(&rescue_code_buf));
    println!();

    println!("Step 3: Saving identity under a password...");
    let storage = user
        .save(b"correct horse battery staple", Some(rescue_code_buf.as_bytes()))
        .expect("failed to save identity");
    println!("  Blocks written: {}", storage.len());
    println!("  Binary size: {} bytes", storage.to_binary().len());
    println!();

    println!("Step 4: Reloading from the saved container...");
    let loaded = User::load(&storage, b"correct horse battery staple", UserOptions::default())
        .expect("failed to load identity");
    let original_mk = user.slot(KeySlot::Mk).unwrap();
    let loaded_mk = loaded.slot(KeySlot::Mk).unwrap();
    if original_mk == loaded_mk {
        println!("  [OK] Master Key round-tripped through password-protected storage.");
    } else {
        println!("  [FAILED] Master Key mismatch after reload!");
    }
    println!();

    println!("Step 5: Deriving a per-site keypair...");
    let mk: [u8; 32] = original_mk.to_array().unwrap();
    let site = keyschedule::derive_site_keypair(&mk, b"example.com").expect("site key derivation failed");
    println!("  Site public key (first 4 bytes): {}", hex::encode(&site.public()[..4]));
    println!();

    println!("=== Example Complete ===");
}
