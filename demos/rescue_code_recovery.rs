//! # Rescue Code Recovery Example
//!
//! Demonstrates the `IDENTITY_RESCUE` path: recovering an identity from
//! its 24-digit rescue code alone (no password), then rekeying and
//! confirming the previous IUK lands in the PIUK ring as the spec's
//! rekey-ordering scenario requires.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example rescue_code_recovery
//! ```

use sqrl_identity_core::codec::rescue_code;
use sqrl_identity_core::{KeySlot, User, UserOptions};

fn main() {
    println!("=== SQRL Identity Core: Rescue Code Recovery Example ===\n");

    println!("Step 1: Generating and saving an identity...");
    let (user, rescue_code_buf) =
        User::generate(UserOptions::default()).expect("failed to generate identity");
    let original_iuk = user.slot(KeySlot::Iuk).unwrap();
    let storage = user
        .save(b"hunter2", Some(rescue_code_buf.as_bytes()))
        .expect("failed to save identity");
    println!("  Saved. Rescue code: {}", rescue_code::format_for_display(&rescue_code_buf));
    println!();

    println!("Step 2: Simulating a forgotten password — recovering via rescue code...");
    let recovered = User::load_from_rescue(&storage, rescue_code_buf.as_bytes(), UserOptions::default())
        .expect("rescue recovery failed");
    if recovered.slot(KeySlot::Iuk) == Some(original_iuk.clone()) {
        println!("  [OK] Recovered IUK matches the original.");
    } else {
        println!("  [FAILED] Recovered IUK does not match!");
    }
    println!();

    println!("Step 3: Wrong rescue code is rejected without detail...");
    let bogus = rescue_code::parse("0000-0000-0000-0000-0000-0000").expect("parse");
    match User::load_from_rescue(&storage, bogus.as_bytes(), UserOptions::default()) {
        Err(e) => println!("  [OK] Rejected as expected: {e}"),
        Ok(_) => println!("  [FAILED] Accepted a wrong rescue code!"),
    }
    println!();

    println!("Step 4: Rekeying the recovered identity...");
    recovered.rekey().expect("rekey failed");
    let piuk0 = recovered.slot(KeySlot::Piuk0).unwrap();
    if piuk0 == original_iuk {
        println!("  [OK] Previous IUK demoted to PIUK0 as expected.");
    } else {
        println!("  [FAILED] PIUK0 doesn't match the pre-rekey IUK!");
    }
    println!();

    println!("=== Example Complete ===");
}
