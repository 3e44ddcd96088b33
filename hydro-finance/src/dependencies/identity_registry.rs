use soroban_sdk::{contractclient, Address, Env};

// Define client interfaces for inter-contract communication
#[contractclient(name = "IdentityRegistryClient")]
pub trait IdentityRegistryInterface {
    fn has_identity(env: Env, address: Address) -> bool;
    fn get_ein(env: Env, address: Address) -> u64;
}
