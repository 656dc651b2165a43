//! # Transaction Façade Surface
//!
//! This crate is the Identity Cryptographic Core; the transaction
//! façade that drives a login flow end to end (URI parsing, the
//! network round trip, UI prompts) is an explicit non-goal (spec.md
//! §1). This module defines only the narrow capability surface that
//! façade needs from the core — callback trait, transaction/credential
//! enums, status codes, and a couple of typed constant tables restored
//! from `original_source/src/sqrl.h` — with no dispatch logic behind
//! any of it.
//!
//! Per spec.md §9's "process-wide mutable callback table" design note,
//! [`TransactionCallbacks`] is always received as a borrowed trait
//! object for the duration of one transaction, never stored in any
//! process-wide state.

use serde::{Deserialize, Serialize};

use crate::identity::User;

/// One method per callback the façade historically dispatched through a
/// global function-pointer table (spec.md §6). A façade crate implements
/// this trait and hands `&dyn TransactionCallbacks` to whatever drives a
/// transaction; the core itself never calls these — it only defines the
/// shape a caller needs.
pub trait TransactionCallbacks {
    /// Resolve which identity a transaction should act on.
    fn on_select_user(&mut self) -> Option<User>;

    /// The caller asked to switch to a different stored identity mid
    /// transaction.
    fn on_select_alternate_identity(&mut self);

    /// Prompt for a credential of the given kind; return whether one was
    /// supplied.
    fn on_authentication_required(&mut self, credential: CredentialKind) -> bool;

    /// Surface a yes/no (or two-button) prompt to the user.
    fn on_ask(&mut self, message: &str, button1_label: &str, button2_label: &str);

    /// Hand a wire payload to the (out-of-scope) network layer.
    fn on_send(&mut self, url: &str, payload: &[u8]);

    /// Report progress (0-100) on a long-running operation; returning
    /// `false` requests cancellation, mirroring EnScrypt's own
    /// progress-callback contract (spec.md §5).
    fn on_progress(&mut self, percent: u8) -> bool;

    /// The core suggests persisting `user`'s current state.
    fn on_save_suggested(&mut self, user: &User);

    /// The transaction has reached a terminal state.
    fn on_transaction_complete(&mut self, status: TransactionStatus);
}

/// The thirteen transaction kinds the core must be able to service
/// (spec.md §6). Behavior is entirely the façade's; this is just the
/// tag a façade attaches to a request into the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// `query` — probe whether a site recognizes this identity.
    AuthQuery,
    /// `ident` — authenticate.
    AuthIdent,
    /// `disable` — mark the identity disabled at a site.
    AuthDisable,
    /// `enable` — re-enable a previously disabled identity.
    AuthEnable,
    /// `remove` — remove the identity from a site.
    AuthRemove,
    /// Persist the identity to its S4 container.
    IdentitySave,
    /// Recover an identity from its rescue code.
    IdentityRescue,
    /// Rotate IUK, demoting the current one into the PIUK ring.
    IdentityRekey,
    /// Exercise the identity-lock unlock path against a server's SUK.
    IdentityUnlock,
    /// Publish ILK to a server that supports identity lock.
    IdentityLock,
    /// Load a stored identity into memory.
    IdentityLoad,
    /// Generate a brand new identity.
    IdentityGenerate,
    /// Resave the identity's Type 1 block under a new password.
    IdentityChangePassword,
}

/// Credential kinds a façade may be asked to supply via
/// [`TransactionCallbacks::on_authentication_required`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialKind {
    /// The identity's password.
    Password,
    /// A cached hint-lock prefix (see [`crate::identity::HintLock`]).
    Hint,
    /// The 24-digit rescue code.
    RescueCode,
    /// A new password, during `IdentityChangePassword`.
    NewPassword,
}

/// Terminal status of a transaction, reported to
/// [`TransactionCallbacks::on_transaction_complete`]. `Cancelled` is
/// never upgraded to `Failed` (spec.md §7) — a caller-requested abort
/// and a genuine failure are always distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Completed successfully.
    Success,
    /// Completed unsuccessfully.
    Failed,
    /// Aborted by a callback returning the cancel sentinel.
    Cancelled,
    /// Still in progress; used for incremental status reporting, not as
    /// a final state.
    Working,
}

/// The set of site-action commands a SQRL `ident`/`query` request may
/// carry, restored from `original_source/src/sqrl.h`'s `Sqrl_Cmd` and
/// collapsed per spec.md §9's REDESIGN FLAG (a typed hierarchy of
/// near-empty subclasses becomes one enum with per-variant data, here
/// simply the variant itself since the payload differences belong to
/// the wire-protocol layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteCommand {
    /// Probe for recognition without authenticating.
    Query,
    /// Authenticate.
    Ident,
    /// Disable the identity at this site.
    Disable,
    /// Re-enable a disabled identity.
    Enable,
    /// Remove the identity from this site.
    Remove,
}

impl SiteCommand {
    /// The wire token this command is spelled as in a SQRL client
    /// `cmd=` field.
    pub fn wire_token(self) -> &'static str {
        match self {
            SiteCommand::Query => "query",
            SiteCommand::Ident => "ident",
            SiteCommand::Disable => "disable",
            SiteCommand::Enable => "enable",
            SiteCommand::Remove => "remove",
        }
    }
}

/// SQRL client option tokens carried in a request's `opt=` field,
/// restored from `sqrl.h`. Interpreting them is the wire-protocol
/// layer's job; this is just the typed constant surface.
pub mod option_tokens {
    /// This identity should only ever be used with SQRL, never a
    /// fallback password.
    pub const SQRLONLY: &str = "sqrlonly";
    /// Require a hardware-backed unlock (Identity Lock) rather than a
    /// "no-IUK-needed" bypass.
    pub const HARDLOCK: &str = "hardlock";
    /// Client Provided Session — skip the usual polling redirect.
    pub const CPS: &str = "cps";
    /// Carry the Server Unlock Key in this request.
    pub const SUK: &str = "suk";
    /// Separator joining multiple option tokens in one `opt=` field.
    pub const SEPARATOR: char = '~';
}

bitflags::bitflags! {
    /// Transaction-information flags a server's response carries back
    /// (`Sqrl_Tif` in `original_source/src/sqrl.h`). Purely a typed
    /// constant surface for the (out-of-scope) wire layer — this crate
    /// neither sets nor interprets them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TransactionInfoFlags: u32 {
        /// The site recognizes this identity's current key.
        const ID_MATCH = 0x01;
        /// The site recognizes a previously retired (PIUK) key.
        const PREVIOUS_ID_MATCH = 0x02;
        /// The request's source IP matches the one that began the
        /// session.
        const IP_MATCH = 0x04;
        /// This identity is disabled at the site.
        const SQRL_DISABLED = 0x08;
        /// The site doesn't support a requested extension.
        const FUNCTION_NOT_SUPPORTED = 0x10;
        /// Transient server-side error; safe to retry.
        const TRANSIENT_ERR = 0x20;
        /// The requested command failed.
        const COMMAND_FAILURE = 0x40;
        /// The client's request was malformed.
        const CLIENT_FAILURE = 0x80;
    }
}
