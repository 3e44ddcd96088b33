use soroban_sdk::{
    contract, contractimpl, contracttype, log, panic_with_error, xdr::ToXdr, Address, Bytes,
    BytesN, Env, IntoVal, String, Symbol, Val, Vec,
};
use stellar_default_impl_macro::default_impl;
use stellar_ownable::{self as ownable, Ownable};
use stellar_ownable_macro::only_owner;
use stellar_upgradeable::UpgradeableInternal;
use stellar_upgradeable_macros::Upgradeable;

use crate::dependencies::*;
use crate::traits::*;

// ==================== Constants ====================

/// Maximum number of records of one kind held by a single user
const MAX_RECORDS_PER_KIND: u32 = 20;

/// Longest field accepted by the payload checks
const MAX_FIELD_LENGTH: usize = 64;

const CARD_NUMBER_MIN_LENGTH: u32 = 12;
const CARD_NUMBER_MAX_LENGTH: u32 = 19;
const CVV_MIN_LENGTH: u32 = 3;
const CVV_MAX_LENGTH: u32 = 4;
const NAME_MAX_LENGTH: u32 = MAX_FIELD_LENGTH as u32;
// IBAN upper bound
const ACCOUNT_NUMBER_MAX_LENGTH: u32 = 34;

const LEDGERS_PER_DAY: u32 = (24 * 3600) / 5;
const RECORD_TTL_THRESHOLD: u32 = 30 * LEDGERS_PER_DAY;
const RECORD_TTL_EXTEND_TO: u32 = 180 * LEDGERS_PER_DAY;
const INSTANCE_TTL_THRESHOLD: u32 = 30 * LEDGERS_PER_DAY;
const INSTANCE_TTL_EXTEND_TO: u32 = 31 * LEDGERS_PER_DAY;

// ==================== Data Structures ====================

/// Storage data key enum
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataKey {
    /// Identity registry contract address
    IdentityRegistry,
    /// Next id to hand out for a record kind
    NextId(RecordKind),
    /// User entry by EIN
    User(u64),
    Card(u64),
    Bank(u64),
    Investment(u64),
}

#[derive(Upgradeable)]
#[contract]
pub struct HydroFinance;

// ==================== Constructor ====================

#[contractimpl]
impl HydroFinance {
    pub fn __constructor(env: &Env, admin: Address, identity_registry: Address) {
        ownable::set_owner(env, &admin);
        env.storage()
            .instance()
            .set(&DataKey::IdentityRegistry, &identity_registry);

        env.events().publish(
            (Symbol::new(env, "initialize"),),
            (admin, identity_registry),
        );
    }
}

// ==================== Record operations implementation ====================

#[contractimpl]
impl RecordOperations for HydroFinance {
    fn add_card(
        env: Env,
        caller: Address,
        number: String,
        expiry: u64,
        name: String,
        cvv: String,
    ) -> u64 {
        caller.require_auth();
        let ein = Self::require_ein(&env, &caller);

        Self::require_chars(
            &env,
            &number,
            CARD_NUMBER_MIN_LENGTH,
            CARD_NUMBER_MAX_LENGTH,
            u8::is_ascii_digit,
            HydroFinanceError::InvalidCardNumber,
        );
        if expiry == 0 {
            panic_with_error!(&env, HydroFinanceError::InvalidExpiry);
        }
        Self::require_name(&env, &name);
        Self::require_chars(
            &env,
            &cvv,
            CVV_MIN_LENGTH,
            CVV_MAX_LENGTH,
            u8::is_ascii_digit,
            HydroFinanceError::InvalidCvv,
        );

        let fingerprint = Self::card_fingerprint(&env, ein, &name, &number, expiry, &cvv);
        let id = Self::append_record(&env, ein, &caller, RecordKind::Card);
        let card = Card {
            id,
            ein_owner: ein,
            number,
            expiry,
            name,
            cvv,
            fingerprint: fingerprint.clone(),
        };
        Self::set_persistent(&env, &DataKey::Card(id), &card);

        env.events().publish(
            (Self::added_topic(&env, RecordKind::Card), ein),
            RecordAddedEvent {
                id,
                caller,
                fingerprint,
            },
        );

        id
    }

    fn add_bank(env: Env, caller: Address, account_number: String, name: String) -> u64 {
        Self::add_account_record(&env, caller, account_number, name, RecordKind::Bank)
    }

    fn add_investment_account(
        env: Env,
        caller: Address,
        account_number: String,
        name: String,
    ) -> u64 {
        Self::add_account_record(&env, caller, account_number, name, RecordKind::Investment)
    }

    fn remove_account(env: Env, caller: Address) {
        caller.require_auth();
        let ein = Self::require_ein(&env, &caller);
        let user = Self::load_user(&env, ein);

        let storage = env.storage().persistent();
        for id in user.cards.iter() {
            storage.remove(&DataKey::Card(id));
        }
        for id in user.banks.iter() {
            storage.remove(&DataKey::Bank(id));
        }
        for id in user.investments.iter() {
            storage.remove(&DataKey::Investment(id));
        }
        storage.remove(&DataKey::User(ein));
        Self::extend_instance_ttl(&env);

        log!(&env, "account removed for ein {:?}", ein);

        env.events().publish(
            (Symbol::new(&env, "account_removed"), ein),
            AccountRemovedEvent {
                owner: user.owner,
                cards: user.cards.len(),
                banks: user.banks.len(),
                investments: user.investments.len(),
            },
        );
    }
}

// ==================== Query function implementation ====================

#[contractimpl]
impl RecordQuery for HydroFinance {
    fn get_user_data(env: Env, caller: Address) -> User {
        let ein = Self::require_ein(&env, &caller);
        Self::load_user(&env, ein)
    }

    fn get_user(env: Env, ein: u64) -> User {
        Self::load_user(&env, ein)
    }

    fn has_user(env: Env, ein: u64) -> bool {
        env.storage().persistent().has(&DataKey::User(ein))
    }

    fn card_by_id(env: Env, id: u64) -> Card {
        env.storage()
            .persistent()
            .get(&DataKey::Card(id))
            .unwrap_or_else(|| panic_with_error!(&env, Self::not_found_error(RecordKind::Card)))
    }

    fn bank_by_id(env: Env, id: u64) -> AccountRecord {
        Self::load_account_record(&env, RecordKind::Bank, id)
    }

    fn investment_by_id(env: Env, id: u64) -> AccountRecord {
        Self::load_account_record(&env, RecordKind::Investment, id)
    }

    fn check_card(
        env: Env,
        caller: Address,
        fingerprint: BytesN<32>,
        name: String,
        number: String,
        expiry: u64,
        cvv: String,
    ) -> bool {
        let Some(user) = Self::find_user(&env, &caller) else {
            return false;
        };
        if Self::card_fingerprint(&env, user.ein, &name, &number, expiry, &cvv) != fingerprint {
            return false;
        }

        user.cards.iter().any(|id| {
            env.storage()
                .persistent()
                .get::<_, Card>(&DataKey::Card(id))
                .is_some_and(|card| card.fingerprint == fingerprint)
        })
    }

    fn check_bank(
        env: Env,
        caller: Address,
        fingerprint: BytesN<32>,
        account_number: String,
        name: String,
    ) -> bool {
        let Some(user) = Self::find_user(&env, &caller) else {
            return false;
        };
        Self::check_account_record(
            &env,
            user.ein,
            user.banks,
            RecordKind::Bank,
            &fingerprint,
            &account_number,
            &name,
        )
    }

    fn check_investment(
        env: Env,
        caller: Address,
        fingerprint: BytesN<32>,
        account_number: String,
        name: String,
    ) -> bool {
        let Some(user) = Self::find_user(&env, &caller) else {
            return false;
        };
        Self::check_account_record(
            &env,
            user.ein,
            user.investments,
            RecordKind::Investment,
            &fingerprint,
            &account_number,
            &name,
        )
    }
}

// ==================== Registry management implementation ====================

#[contractimpl]
impl RegistryManagement for HydroFinance {
    #[only_owner]
    fn set_identity_registry_by_admin(env: Env, identity_registry: Address) {
        env.storage()
            .instance()
            .set(&DataKey::IdentityRegistry, &identity_registry);

        env.events().publish(
            (
                Symbol::new(&env, "set_identity_registry"),
                identity_registry.clone(),
            ),
            Self::get_admin_internal(&env),
        );
    }

    fn get_identity_registry(env: Env) -> Address {
        Self::get_identity_registry_internal(&env)
    }

    fn get_admin(env: Env) -> Address {
        Self::get_admin_internal(&env)
    }
}

// ==================== Internal helper functions ====================

impl HydroFinance {
    /// Get admin address
    fn get_admin_internal(env: &Env) -> Address {
        ownable::get_owner(env).unwrap() // Set in constructor
    }

    /// Get identity registry address
    fn get_identity_registry_internal(env: &Env) -> Address {
        env.storage()
            .instance()
            .get(&DataKey::IdentityRegistry)
            .unwrap() // Set in constructor
    }

    /// Resolve an address to its EIN, None if the registry has no identity for it
    fn resolve_ein(env: &Env, address: &Address) -> Option<u64> {
        let registry = IdentityRegistryClient::new(env, &Self::get_identity_registry_internal(env));
        if registry.has_identity(address) {
            Some(registry.get_ein(address))
        } else {
            None
        }
    }

    /// Resolve an address to its EIN
    fn require_ein(env: &Env, address: &Address) -> u64 {
        Self::resolve_ein(env, address)
            .unwrap_or_else(|| panic_with_error!(env, HydroFinanceError::IdentityNotFound))
    }

    /// Get the user entry of an address, if both identity and entry exist
    fn find_user(env: &Env, address: &Address) -> Option<User> {
        let ein = Self::resolve_ein(env, address)?;
        env.storage().persistent().get(&DataKey::User(ein))
    }

    fn load_user(env: &Env, ein: u64) -> User {
        env.storage()
            .persistent()
            .get(&DataKey::User(ein))
            .unwrap_or_else(|| panic_with_error!(env, HydroFinanceError::UserNotFound))
    }

    fn load_account_record(env: &Env, kind: RecordKind, id: u64) -> AccountRecord {
        env.storage()
            .persistent()
            .get(&Self::record_key(kind, id))
            .unwrap_or_else(|| panic_with_error!(env, Self::not_found_error(kind)))
    }

    fn add_account_record(
        env: &Env,
        caller: Address,
        account_number: String,
        name: String,
        kind: RecordKind,
    ) -> u64 {
        caller.require_auth();
        let ein = Self::require_ein(env, &caller);

        Self::require_chars(
            env,
            &account_number,
            1,
            ACCOUNT_NUMBER_MAX_LENGTH,
            u8::is_ascii_alphanumeric,
            HydroFinanceError::InvalidAccountNumber,
        );
        Self::require_name(env, &name);

        let fingerprint = Self::account_fingerprint(env, ein, &account_number, &name);
        let id = Self::append_record(env, ein, &caller, kind);
        let record = AccountRecord {
            id,
            ein_owner: ein,
            account_number,
            name,
            fingerprint: fingerprint.clone(),
        };
        Self::set_persistent(env, &Self::record_key(kind, id), &record);

        env.events().publish(
            (Self::added_topic(env, kind), ein),
            RecordAddedEvent {
                id,
                caller,
                fingerprint,
            },
        );

        id
    }

    fn check_account_record(
        env: &Env,
        ein: u64,
        ids: Vec<u64>,
        kind: RecordKind,
        fingerprint: &BytesN<32>,
        account_number: &String,
        name: &String,
    ) -> bool {
        if Self::account_fingerprint(env, ein, account_number, name) != *fingerprint {
            return false;
        }

        ids.iter().any(|id| {
            env.storage()
                .persistent()
                .get::<_, AccountRecord>(&Self::record_key(kind, id))
                .is_some_and(|record| record.fingerprint == *fingerprint)
        })
    }

    /// Allocate an id of the given kind and append it to the user's list,
    /// creating the user entry on first use
    fn append_record(env: &Env, ein: u64, caller: &Address, kind: RecordKind) -> u64 {
        let mut user: User = env
            .storage()
            .persistent()
            .get(&DataKey::User(ein))
            .unwrap_or_else(|| User {
                ein,
                owner: caller.clone(),
                cards: Vec::new(env),
                banks: Vec::new(env),
                investments: Vec::new(env),
            });

        let ids = match kind {
            RecordKind::Card => &mut user.cards,
            RecordKind::Bank => &mut user.banks,
            RecordKind::Investment => &mut user.investments,
        };
        if ids.len() >= MAX_RECORDS_PER_KIND {
            panic_with_error!(env, HydroFinanceError::TooManyRecords);
        }

        let id = Self::next_id(env, kind);
        ids.push_back(id);
        Self::set_persistent(env, &DataKey::User(ein), &user);

        id
    }

    /// Ids start at 1 and are never handed out twice
    fn next_id(env: &Env, kind: RecordKind) -> u64 {
        let key = DataKey::NextId(kind);
        let id: u64 = env.storage().instance().get(&key).unwrap_or(1);
        env.storage().instance().set(&key, &(id + 1));
        Self::extend_instance_ttl(env);
        id
    }

    fn record_key(kind: RecordKind, id: u64) -> DataKey {
        match kind {
            RecordKind::Card => DataKey::Card(id),
            RecordKind::Bank => DataKey::Bank(id),
            RecordKind::Investment => DataKey::Investment(id),
        }
    }

    fn added_topic(env: &Env, kind: RecordKind) -> Symbol {
        match kind {
            RecordKind::Card => Symbol::new(env, "card_added"),
            RecordKind::Bank => Symbol::new(env, "bank_added"),
            RecordKind::Investment => Symbol::new(env, "investment_added"),
        }
    }

    fn not_found_error(kind: RecordKind) -> HydroFinanceError {
        match kind {
            RecordKind::Card => HydroFinanceError::CardNotFound,
            RecordKind::Bank => HydroFinanceError::BankNotFound,
            RecordKind::Investment => HydroFinanceError::InvestmentNotFound,
        }
    }

    fn set_persistent<V: IntoVal<Env, Val>>(env: &Env, key: &DataKey, value: &V) {
        let storage = env.storage().persistent();
        storage.set(key, value);
        storage.extend_ttl(key, RECORD_TTL_THRESHOLD, RECORD_TTL_EXTEND_TO);
    }

    fn extend_instance_ttl(env: &Env) {
        env.storage()
            .instance()
            .extend_ttl(INSTANCE_TTL_THRESHOLD, INSTANCE_TTL_EXTEND_TO);
    }

    /// Card fingerprint: sha256(ein, name, number, expiry, cvv)
    fn card_fingerprint(
        env: &Env,
        ein: u64,
        name: &String,
        number: &String,
        expiry: u64,
        cvv: &String,
    ) -> BytesN<32> {
        let mut data = Bytes::from_array(env, &ein.to_be_bytes());
        data.append(&name.clone().to_xdr(env));
        data.append(&number.clone().to_xdr(env));
        data.append(&Bytes::from_array(env, &expiry.to_be_bytes()));
        data.append(&cvv.clone().to_xdr(env));

        env.crypto().sha256(&data).to_bytes()
    }

    /// Bank and investment fingerprint: sha256(ein, account_number, name)
    fn account_fingerprint(
        env: &Env,
        ein: u64,
        account_number: &String,
        name: &String,
    ) -> BytesN<32> {
        let mut data = Bytes::from_array(env, &ein.to_be_bytes());
        data.append(&account_number.clone().to_xdr(env));
        data.append(&name.clone().to_xdr(env));

        env.crypto().sha256(&data).to_bytes()
    }

    fn require_name(env: &Env, name: &String) {
        if name.len() == 0 || name.len() > NAME_MAX_LENGTH {
            panic_with_error!(env, HydroFinanceError::InvalidName);
        }
    }

    /// Check length bounds and that every byte passes `allowed`
    fn require_chars(
        env: &Env,
        value: &String,
        min_length: u32,
        max_length: u32,
        allowed: fn(&u8) -> bool,
        error: HydroFinanceError,
    ) {
        let length = value.len();
        if length < min_length || length > max_length {
            panic_with_error!(env, error);
        }

        let mut buffer = [0u8; MAX_FIELD_LENGTH];
        let chars = &mut buffer[..length as usize];
        value.copy_into_slice(chars);
        if !chars.iter().all(allowed) {
            panic_with_error!(env, error);
        }
    }
}

// ==================== Ownable Implementation ====================

#[default_impl]
#[contractimpl]
impl Ownable for HydroFinance {}

// Provide upgrade auth via OpenZeppelin UpgradeableInternal
impl UpgradeableInternal for HydroFinance {
    fn _require_auth(e: &Env, operator: &Address) {
        operator.require_auth();
        let owner = ownable::get_owner(e).unwrap();
        if *operator != owner {
            panic_with_error!(e, HydroFinanceError::Unauthorized);
        }
    }
}
