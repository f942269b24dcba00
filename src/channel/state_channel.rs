use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{
    AppInstance, AppInstanceProposal, FreeBalance, ModelError, TokenIndexedCoinTransferMap,
};
use crate::{
    abiencode::{
        types::{Address, Hash, U256},
        Token,
    },
    config::FreeBalanceConfig,
    sig::Identifier,
};

/// Version of the [StateChannel] JSON layout written to the store.
pub const SCHEMA_VERSION: u32 = 1;

/// Contracts the multisig was deployed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalStateChannelAddresses {
    pub proxy_factory: Address,
    pub multisig_mastercopy: Address,
}

/// Snapshot of everything known about one channel, keyed by its multisig.
///
/// The free balance is always present. The keys of `app_instances` and
/// `proposed_app_instances` are the identity hashes of their entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChannel {
    multisig_address: Address,
    addresses: CriticalStateChannelAddresses,
    user_identifiers: [Identifier; 2],
    /// Canonical signature order of all commitments.
    multisig_owners: [Address; 2],
    free_balance: AppInstance,
    app_instances: BTreeMap<Hash, AppInstance>,
    proposed_app_instances: BTreeMap<Hash, AppInstanceProposal>,
    monotonic_num_proposed_apps: u64,
    schema_version: u32,
}

impl StateChannel {
    /// A new channel with an empty free balance, as created by Setup.
    pub fn setup_channel(
        identity_app: Address,
        addresses: CriticalStateChannelAddresses,
        multisig_address: Address,
        initiator: Identifier,
        responder: Identifier,
        free_balance_config: &FreeBalanceConfig,
    ) -> Result<Self, ModelError> {
        if initiator == responder {
            return Err(ModelError::SameParticipant(initiator));
        }
        let user_identifiers = [initiator, responder];
        Ok(Self {
            multisig_address,
            addresses,
            user_identifiers,
            multisig_owners: [initiator.signer_address(), responder.signer_address()],
            free_balance: AppInstance::free_balance(
                multisig_address,
                user_identifiers,
                identity_app,
                free_balance_config,
            ),
            app_instances: BTreeMap::new(),
            proposed_app_instances: BTreeMap::new(),
            monotonic_num_proposed_apps: 0,
            schema_version: SCHEMA_VERSION,
        })
    }

    pub fn multisig_address(&self) -> Address {
        self.multisig_address
    }

    pub fn addresses(&self) -> &CriticalStateChannelAddresses {
        &self.addresses
    }

    pub fn user_identifiers(&self) -> &[Identifier; 2] {
        &self.user_identifiers
    }

    pub fn multisig_owners(&self) -> &[Address; 2] {
        &self.multisig_owners
    }

    pub fn free_balance(&self) -> &AppInstance {
        &self.free_balance
    }

    pub fn app_instances(&self) -> &BTreeMap<Hash, AppInstance> {
        &self.app_instances
    }

    pub fn proposed_app_instances(&self) -> &BTreeMap<Hash, AppInstanceProposal> {
        &self.proposed_app_instances
    }

    pub fn monotonic_num_proposed_apps(&self) -> u64 {
        self.monotonic_num_proposed_apps
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn is_participant(&self, identifier: &Identifier) -> bool {
        self.user_identifiers.contains(identifier)
    }

    /// The other participant.
    pub fn counterparty_of(&self, identifier: &Identifier) -> Result<Identifier, ModelError> {
        match self.user_identifiers {
            [a, b] if a == *identifier => Ok(b),
            [a, b] if b == *identifier => Ok(a),
            _ => Err(ModelError::NotAParticipant(*identifier)),
        }
    }

    pub fn get_app_instance(&self, identity_hash: &Hash) -> Result<&AppInstance, ModelError> {
        self.app_instances
            .get(identity_hash)
            .ok_or(ModelError::NoSuchApp(*identity_hash))
    }

    pub fn get_proposal(&self, identity_hash: &Hash) -> Result<&AppInstanceProposal, ModelError> {
        self.proposed_app_instances
            .get(identity_hash)
            .ok_or(ModelError::NoSuchProposal(*identity_hash))
    }

    /// Highest sequence number wins, `None` if nothing is installed.
    pub fn most_recently_installed_app_instance(&self) -> Option<&AppInstance> {
        self.app_instances.values().max_by_key(|app| app.app_seq_no())
    }

    pub fn free_balance_state(&self) -> Result<FreeBalance, ModelError> {
        self.free_balance.as_free_balance()
    }

    pub fn get_free_balance_addr_of(&self, identifier: &Identifier) -> Result<Address, ModelError> {
        if !self.is_participant(identifier) {
            return Err(ModelError::NotAParticipant(*identifier));
        }
        Ok(identifier.signer_address())
    }

    pub fn assert_sufficient_funds_within_free_balance(
        &self,
        identifier: &Identifier,
        token: Address,
        amount: U256,
    ) -> Result<(), ModelError> {
        let owner = self.get_free_balance_addr_of(identifier)?;
        let available = self.free_balance_state()?.balance(token, owner);
        if available < amount {
            return Err(ModelError::InsufficientFunds {
                owner,
                token,
                available,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Record a proposal. Its sequence number must be the next one, which
    /// also reserves it: sequence numbers are never reused, even if the
    /// proposal is later rejected.
    pub fn add_proposal(&self, proposal: AppInstanceProposal) -> Result<Self, ModelError> {
        if proposal.multisig_address != self.multisig_address {
            return Err(ModelError::WrongMultisig {
                expected: self.multisig_address,
                got: proposal.multisig_address,
            });
        }
        for identifier in [&proposal.initiator_identifier, &proposal.responder_identifier] {
            if !self.is_participant(identifier) {
                return Err(ModelError::NotAParticipant(*identifier));
            }
        }
        let expected = self
            .monotonic_num_proposed_apps
            .checked_add(1)
            .ok_or(ModelError::Overflow)?;
        if proposal.app_seq_no != expected {
            return Err(ModelError::InvalidAppSeqNo {
                expected,
                got: proposal.app_seq_no,
            });
        }
        proposal.validate()?;
        if self.proposed_app_instances.contains_key(&proposal.identity_hash) {
            return Err(ModelError::ProposalAlreadyExists(proposal.identity_hash));
        }

        let mut next = self.clone();
        next.monotonic_num_proposed_apps = expected;
        next.proposed_app_instances
            .insert(proposal.identity_hash, proposal);
        Ok(next)
    }

    pub fn remove_proposal(&self, identity_hash: &Hash) -> Result<Self, ModelError> {
        let mut next = self.clone();
        next.proposed_app_instances
            .remove(identity_hash)
            .ok_or(ModelError::NoSuchProposal(*identity_hash))?;
        Ok(next)
    }

    /// Overwrite the free balance with a new version. This is the only
    /// transition allowed to change the value held by the channel, it is
    /// meant for deposit and withdrawal bookkeeping.
    pub fn set_free_balance(&self, free_balance: FreeBalance) -> Result<Self, ModelError> {
        let app = &self.free_balance;
        let next_version = app
            .latest_version_number()
            .checked_add(1)
            .ok_or(ModelError::Overflow)?;
        let mut next = self.clone();
        next.free_balance =
            app.set_state(free_balance.to_state(), next_version, app.state_timeout())?;
        Ok(next)
    }

    /// Move the deposits out of the free balance and into `app`.
    pub fn install_app(
        &self,
        app: AppInstance,
        decrements: &TokenIndexedCoinTransferMap,
    ) -> Result<Self, ModelError> {
        if app.multisig_address() != self.multisig_address {
            return Err(ModelError::WrongMultisig {
                expected: self.multisig_address,
                got: app.multisig_address(),
            });
        }
        let identity_hash = app.identity_hash();
        if self.app_instances.contains_key(&identity_hash) {
            return Err(ModelError::AppAlreadyInstalled(identity_hash));
        }

        let free_balance = self
            .free_balance_state()?
            .apply_decrements(decrements)?
            .add_active_app(identity_hash)?;
        let mut next = self.set_free_balance(free_balance)?;
        next.proposed_app_instances.remove(&identity_hash);
        next.app_instances.insert(identity_hash, app);
        Ok(next)
    }

    /// Remove an app, replacing the free balance with `updated`, which must
    /// hold exactly the previous balances plus what was deposited into the
    /// app.
    pub fn uninstall_app(
        &self,
        identity_hash: &Hash,
        updated: FreeBalance,
    ) -> Result<Self, ModelError> {
        let app = self.get_app_instance(identity_hash)?;
        let current = self.free_balance_state()?;

        if updated.active_apps().contains(identity_hash) {
            return Err(ModelError::AppStillActive(*identity_hash));
        }
        let remaining = current.remove_active_app(*identity_hash)?;
        if remaining.active_apps() != updated.active_apps() || current.owners() != updated.owners()
        {
            return Err(ModelError::ActiveAppsChanged);
        }

        let deposits = app.deposits().per_token()?;
        let tokens: BTreeSet<Address> = current
            .tokens()
            .chain(updated.tokens())
            .chain(deposits.keys())
            .copied()
            .collect();
        for token in tokens {
            let deposited = deposits.get(&token).copied().unwrap_or_default();
            let expected = current
                .total(token)?
                .checked_add(deposited)
                .ok_or(ModelError::Overflow)?;
            let actual = updated.total(token)?;
            if actual != expected {
                return Err(ModelError::ValueNotConserved {
                    token,
                    expected,
                    actual,
                });
            }
        }

        let mut next = self.set_free_balance(updated)?;
        next.app_instances.remove(identity_hash);
        Ok(next)
    }

    /// Set the state of an installed app, `version_number` must follow the
    /// current one.
    pub fn set_state(
        &self,
        identity_hash: &Hash,
        state: Token,
        version_number: u64,
        state_timeout: u64,
    ) -> Result<Self, ModelError> {
        let app = self
            .get_app_instance(identity_hash)?
            .set_state(state, version_number, state_timeout)?;
        let mut next = self.clone();
        next.app_instances.insert(*identity_hash, app);
        Ok(next)
    }

    /// [StateChannel::set_state], recording `action` as the app's latest
    /// action.
    pub fn apply_action(
        &self,
        identity_hash: &Hash,
        action: Token,
        state: Token,
        version_number: u64,
        state_timeout: u64,
    ) -> Result<Self, ModelError> {
        let app = self
            .get_app_instance(identity_hash)?
            .apply_action(action, state, version_number, state_timeout)?;
        let mut next = self.clone();
        next.app_instances.insert(*identity_hash, app);
        Ok(next)
    }
}
