use soroban_sdk::{contracterror, contracttype, Address, BytesN, Env, String, Vec};

// ==================== Record Types ====================

/// Financial records held by a single identity
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct User {
    pub ein: u64,
    /// Address that created the entry
    pub owner: Address,
    pub cards: Vec<u64>,
    pub banks: Vec<u64>,
    pub investments: Vec<u64>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Card {
    pub id: u64,
    pub ein_owner: u64,
    pub number: String,
    /// Expiry as a unix timestamp
    pub expiry: u64,
    pub name: String,
    pub cvv: String,
    pub fingerprint: BytesN<32>,
}

/// Bank or investment account record
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccountRecord {
    pub id: u64,
    pub ein_owner: u64,
    pub account_number: String,
    pub name: String,
    pub fingerprint: BytesN<32>,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordKind {
    Card,
    Bank,
    Investment,
}

// ==================== Record Store Traits ====================

/// Record mutation trait
pub trait RecordOperations {
    /// Add a credit card for the caller's identity
    ///
    /// # Parameters
    /// - `caller`: Address resolved to an EIN through the identity registry
    /// - `number`: Card number (12-19 digits)
    /// - `expiry`: Expiry timestamp
    /// - `name`: Display name of the card
    /// - `cvv`: Card verification value (3-4 digits)
    ///
    /// # Returns
    /// Returns the id of the new card
    fn add_card(
        env: Env,
        caller: Address,
        number: String,
        expiry: u64,
        name: String,
        cvv: String,
    ) -> u64;

    /// Add a bank account for the caller's identity, returns the new id
    fn add_bank(env: Env, caller: Address, account_number: String, name: String) -> u64;

    /// Add an investment account for the caller's identity, returns the new id
    fn add_investment_account(
        env: Env,
        caller: Address,
        account_number: String,
        name: String,
    ) -> u64;

    /// Delete the caller's user entry together with every record it references
    fn remove_account(env: Env, caller: Address);
}

/// Read-only query functions
pub trait RecordQuery {
    /// Get the user entry of the caller's identity
    fn get_user_data(env: Env, caller: Address) -> User;

    /// Get a user entry by EIN
    fn get_user(env: Env, ein: u64) -> User;

    /// Check if an EIN has a user entry
    fn has_user(env: Env, ein: u64) -> bool;

    fn card_by_id(env: Env, id: u64) -> Card;

    fn bank_by_id(env: Env, id: u64) -> AccountRecord;

    fn investment_by_id(env: Env, id: u64) -> AccountRecord;

    /// Check that the caller owns a card with the given fingerprint and that
    /// the fingerprint matches the supplied payload
    fn check_card(
        env: Env,
        caller: Address,
        fingerprint: BytesN<32>,
        name: String,
        number: String,
        expiry: u64,
        cvv: String,
    ) -> bool;

    fn check_bank(
        env: Env,
        caller: Address,
        fingerprint: BytesN<32>,
        account_number: String,
        name: String,
    ) -> bool;

    fn check_investment(
        env: Env,
        caller: Address,
        fingerprint: BytesN<32>,
        account_number: String,
        name: String,
    ) -> bool;
}

/// Admin trait
pub trait RegistryManagement {
    /// Set the identity registry address by admin
    fn set_identity_registry_by_admin(env: Env, identity_registry: Address);

    fn get_identity_registry(env: Env) -> Address;

    fn get_admin(env: Env) -> Address;
}

// ==================== Events ====================

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordAddedEvent {
    pub id: u64,
    pub caller: Address,
    pub fingerprint: BytesN<32>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccountRemovedEvent {
    pub owner: Address,
    pub cards: u32,
    pub banks: u32,
    pub investments: u32,
}

// ==================== Errors ====================

#[contracterror]
#[derive(Clone, Debug, Copy, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum HydroFinanceError {
    /// Caller has no identity in the registry
    IdentityNotFound = 1,
    /// Identity has no user entry
    UserNotFound = 2,
    CardNotFound = 3,
    BankNotFound = 4,
    InvestmentNotFound = 5,
    InvalidCardNumber = 6,
    InvalidExpiry = 7,
    InvalidName = 8,
    InvalidCvv = 9,
    InvalidAccountNumber = 10,
    /// Per-kind record limit reached
    TooManyRecords = 11,
    Unauthorized = 12,
}
