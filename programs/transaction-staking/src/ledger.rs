// Ledger store and the staged transaction every instruction runs inside.
//
// A `LedgerTransaction` reads through to the store, buffers every write and
// refuses keys the instruction did not declare. Nothing reaches the store
// until the caller applies the `WriteSet` returned by `commit`; dropping the
// transaction discards the buffer.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use solana_program::pubkey::Pubkey;

use crate::{error::StakingError, state::Record};

/// Raw contents of one ledger address: its balance and its encoded record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerAccount {
    pub lamports: u64,
    pub data: Vec<u8>,
}

impl LedgerAccount {
    pub fn is_empty(&self) -> bool {
        self.lamports == 0 && self.data.is_empty()
    }
}

pub trait LedgerStore {
    fn account(&self, key: &Pubkey) -> Option<&LedgerAccount>;
    fn store(&mut self, key: Pubkey, account: LedgerAccount);
    fn remove(&mut self, key: &Pubkey);

    fn lamports(&self, key: &Pubkey) -> u64 {
        self.account(key).map_or(0, |a| a.lamports)
    }

    /// Apply a committed transaction. Accounts left with no lamports and no
    /// data are dropped from the store.
    fn apply(&mut self, writes: WriteSet) {
        for (key, account) in writes.writes {
            if account.is_empty() {
                self.remove(&key);
            } else {
                self.store(key, account);
            }
        }
    }
}

/// Read a record straight from the store, outside of any transaction.
pub fn load_record<R: Record, S: LedgerStore + ?Sized>(
    store: &S,
    key: &Pubkey,
) -> Result<R, StakingError> {
    let account = store.account(key).ok_or(StakingError::NotFound)?;
    R::decode(&account.data)
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    accounts: HashMap<Pubkey, LedgerAccount>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit lamports to a wallet, creating it if needed.
    pub fn deposit(&mut self, key: Pubkey, lamports: u64) -> Result<(), StakingError> {
        let account = self.accounts.entry(key).or_default();
        account.lamports = account
            .lamports
            .checked_add(lamports)
            .ok_or(StakingError::MathError)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Pubkey> {
        self.accounts.keys()
    }
}

impl LedgerStore for MemoryLedger {
    fn account(&self, key: &Pubkey) -> Option<&LedgerAccount> {
        self.accounts.get(key)
    }

    fn store(&mut self, key: Pubkey, account: LedgerAccount) {
        self.accounts.insert(key, account);
    }

    fn remove(&mut self, key: &Pubkey) {
        self.accounts.remove(key);
    }
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

/// Buffered writes of one successful instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    writes: BTreeMap<Pubkey, LedgerAccount>,
}

impl WriteSet {
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn touches(&self, key: &Pubkey) -> bool {
        self.writes.contains_key(key)
    }
}

pub struct LedgerTransaction<'a, S: LedgerStore + ?Sized> {
    store: &'a S,
    declared: BTreeSet<Pubkey>,
    writes: BTreeMap<Pubkey, LedgerAccount>,
}

impl<'a, S: LedgerStore + ?Sized> LedgerTransaction<'a, S> {
    pub fn begin(store: &'a S, declared: &[Pubkey]) -> Self {
        Self {
            store,
            declared: declared.iter().copied().collect(),
            writes: BTreeMap::new(),
        }
    }

    fn check_declared(&self, key: &Pubkey) -> Result<(), StakingError> {
        if !self.declared.contains(key) {
            return Err(StakingError::UndeclaredAccount);
        }
        Ok(())
    }

    fn read(&self, key: &Pubkey) -> Result<LedgerAccount, StakingError> {
        self.check_declared(key)?;
        Ok(match self.writes.get(key) {
            Some(staged) => staged.clone(),
            None => self.store.account(key).cloned().unwrap_or_default(),
        })
    }

    fn write(&mut self, key: &Pubkey, account: LedgerAccount) -> Result<(), StakingError> {
        self.check_declared(key)?;
        self.writes.insert(*key, account);
        Ok(())
    }

    pub fn lamports(&self, key: &Pubkey) -> Result<u64, StakingError> {
        Ok(self.read(key)?.lamports)
    }

    /// Whether `key` currently holds a record of any kind.
    pub fn has_record(&self, key: &Pubkey) -> Result<bool, StakingError> {
        Ok(!self.read(key)?.data.is_empty())
    }

    pub fn get<R: Record>(&self, key: &Pubkey) -> Result<R, StakingError> {
        R::decode(&self.read(key)?.data)
    }

    /// Write a new record. Fails if the key already holds one.
    pub fn create<R: Record>(&mut self, key: &Pubkey, record: &R) -> Result<(), StakingError> {
        let mut account = self.read(key)?;
        if !account.data.is_empty() {
            return Err(StakingError::AlreadyInitialized);
        }
        account.data = record.encode()?;
        self.write(key, account)
    }

    /// Overwrite an existing record of the same kind.
    pub fn put<R: Record>(&mut self, key: &Pubkey, record: &R) -> Result<(), StakingError> {
        let mut account = self.read(key)?;
        R::decode(&account.data)?;
        account.data = record.encode()?;
        self.write(key, account)
    }

    /// Remove the record at `key`. Its lamports must already be drained.
    pub fn delete<R: Record>(&mut self, key: &Pubkey) -> Result<(), StakingError> {
        let mut account = self.read(key)?;
        R::decode(&account.data)?;
        if account.lamports != 0 {
            return Err(StakingError::InsufficientFunds);
        }
        account.data.clear();
        self.write(key, account)
    }

    pub fn transfer(&mut self, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<(), StakingError> {
        let mut source = self.read(from)?;
        source.lamports = source
            .lamports
            .checked_sub(amount)
            .ok_or(StakingError::InsufficientFunds)?;
        self.write(from, source)?;

        let mut destination = self.read(to)?;
        destination.lamports = destination
            .lamports
            .checked_add(amount)
            .ok_or(StakingError::MathError)?;
        self.write(to, destination)
    }

    pub fn commit(self) -> WriteSet {
        WriteSet {
            writes: self.writes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FeeVault, Staker};

    fn funded(key: Pubkey, lamports: u64) -> MemoryLedger {
        let mut ledger = MemoryLedger::new();
        ledger.deposit(key, lamports).unwrap();
        ledger
    }

    #[test]
    fn test_writes_are_invisible_until_applied() {
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let mut ledger = funded(alice, 100);

        let mut tx = LedgerTransaction::begin(&ledger, &[alice, bob]);
        tx.transfer(&alice, &bob, 40).unwrap();
        assert_eq!(tx.lamports(&alice).unwrap(), 60);
        assert_eq!(tx.lamports(&bob).unwrap(), 40);
        let writes = tx.commit();
        assert_eq!(writes.len(), 2);
        assert!(writes.touches(&bob));

        assert_eq!(ledger.lamports(&alice), 100);
        assert_eq!(ledger.lamports(&bob), 0);

        ledger.apply(writes);
        assert_eq!(ledger.lamports(&alice), 60);
        assert_eq!(ledger.lamports(&bob), 40);
    }

    #[test]
    fn test_dropped_transaction_leaves_store_untouched() {
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let ledger = funded(alice, 100);

        {
            let mut tx = LedgerTransaction::begin(&ledger, &[alice, bob]);
            tx.transfer(&alice, &bob, 100).unwrap();
            assert_eq!(
                tx.transfer(&alice, &bob, 1),
                Err(StakingError::InsufficientFunds)
            );
        }

        assert_eq!(ledger.lamports(&alice), 100);
        assert!(ledger.account(&bob).is_none());
    }

    #[test]
    fn test_undeclared_key_is_rejected() {
        let alice = Pubkey::new_unique();
        let stranger = Pubkey::new_unique();
        let ledger = funded(alice, 100);

        let mut tx = LedgerTransaction::begin(&ledger, &[alice]);
        assert_eq!(
            tx.transfer(&alice, &stranger, 1),
            Err(StakingError::UndeclaredAccount)
        );
        assert_eq!(tx.lamports(&stranger), Err(StakingError::UndeclaredAccount));
    }

    #[test]
    fn test_create_put_delete_lifecycle() {
        let owner = Pubkey::new_unique();
        let key = Pubkey::new_unique();
        let mut ledger = MemoryLedger::new();

        let staker = Staker {
            owner,
            amount: 5,
            reward_debt: 0,
            bump: 250,
        };

        let mut tx = LedgerTransaction::begin(&ledger, &[key]);
        assert_eq!(tx.get::<Staker>(&key), Err(StakingError::NotFound));
        tx.create(&key, &staker).unwrap();
        assert_eq!(tx.create(&key, &staker), Err(StakingError::AlreadyInitialized));
        assert_eq!(
            tx.put(&key, &FeeVault { bump: 1 }),
            Err(StakingError::InvalidAccountData)
        );
        ledger.apply(tx.commit());
        assert_eq!(load_record::<Staker, _>(&ledger, &key).unwrap(), staker);

        let mut tx = LedgerTransaction::begin(&ledger, &[key]);
        tx.delete::<Staker>(&key).unwrap();
        assert!(!tx.has_record(&key).unwrap());
        ledger.apply(tx.commit());
        assert!(ledger.account(&key).is_none());
    }

    #[test]
    fn test_delete_requires_drained_account() {
        let key = Pubkey::new_unique();
        let mut ledger = funded(key, 10);
        let mut tx = LedgerTransaction::begin(&ledger, &[key]);
        tx.create(&key, &FeeVault { bump: 1 }).unwrap();
        ledger.apply(tx.commit());

        let mut tx = LedgerTransaction::begin(&ledger, &[key]);
        assert_eq!(
            tx.delete::<FeeVault>(&key),
            Err(StakingError::InsufficientFunds)
        );
    }

    #[test]
    fn test_self_transfer_is_balance_neutral() {
        let alice = Pubkey::new_unique();
        let ledger = funded(alice, 10);
        let mut tx = LedgerTransaction::begin(&ledger, &[alice]);
        tx.transfer(&alice, &alice, 10).unwrap();
        assert_eq!(tx.lamports(&alice).unwrap(), 10);
    }
}
