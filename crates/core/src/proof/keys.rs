//! Proving and verifying key cache
//!
//! Key setup is the expensive, reusable stage of the pipeline. The store keeps one
//! `OnceCell` slot per circuit shape: the first caller runs setup, concurrent
//! callers for the same shape block on that slot, and everyone afterwards shares
//! the same `Arc`'d keys read-only. A failed setup leaves the slot empty so the
//! caller may retry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use once_cell::sync::OnceCell;
use tracing::debug;

use super::withdraw_circuit::{CircuitShape, WithdrawalCircuit};
use super::{Groth16Backend, ProofBackend};
use crate::error::ProofError;

/// Keys for one circuit shape
pub struct KeyPair<B: ProofBackend> {
    pub shape: CircuitShape,
    pub proving_key: B::ProvingKey,
    pub verifying_key: B::VerifyingKey,
}

impl KeyPair<Groth16Backend> {
    /// Serialize the proving key
    pub fn serialize_proving_key(&self) -> Result<Vec<u8>, ProofError> {
        let mut bytes = Vec::new();
        self.proving_key
            .serialize_compressed(&mut bytes)
            .map_err(|e| ProofError::SerializationError(e.to_string()))?;
        Ok(bytes)
    }

    /// Serialize the verifying key
    pub fn serialize_verifying_key(&self) -> Result<Vec<u8>, ProofError> {
        let mut bytes = Vec::new();
        self.verifying_key
            .vk
            .serialize_compressed(&mut bytes)
            .map_err(|e| ProofError::SerializationError(e.to_string()))?;
        Ok(bytes)
    }

    /// Load from serialized keys
    pub fn from_bytes(shape: CircuitShape, pk_bytes: &[u8], vk_bytes: &[u8]) -> Result<Self, ProofError> {
        let proving_key =
            ProvingKey::<Bn254>::deserialize_compressed(pk_bytes).map_err(|_| ProofError::InvalidProvingKey)?;

        let verifying_key =
            VerifyingKey::<Bn254>::deserialize_compressed(vk_bytes).map_err(|_| ProofError::InvalidVerifyingKey)?;

        if proving_key.vk != verifying_key {
            return Err(ProofError::InvalidVerifyingKey);
        }

        let verifying_key =
            Groth16::<Bn254>::process_vk(&verifying_key).map_err(|e| ProofError::SetupFailed(e.to_string()))?;

        Ok(Self {
            shape,
            proving_key,
            verifying_key,
        })
    }

    /// Raw verification key, e.g. for verifier export
    pub fn raw_verifying_key(&self) -> &VerifyingKey<Bn254> {
        &self.verifying_key.vk
    }
}

type Slot<B> = Arc<OnceCell<Arc<KeyPair<B>>>>;

/// Shared key cache, keyed by circuit shape
pub struct KeyStore<B: ProofBackend = Groth16Backend> {
    backend: B,
    slots: Mutex<HashMap<CircuitShape, Slot<B>>>,
    setups_run: AtomicUsize,
}

impl<B: ProofBackend> KeyStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            slots: Mutex::new(HashMap::new()),
            setups_run: AtomicUsize::new(0),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn slot(&self, shape: CircuitShape) -> Slot<B> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.entry(shape).or_default().clone()
    }

    /// Keys for `shape`, running setup at most once
    pub fn get_or_setup(&self, shape: CircuitShape) -> Result<Arc<KeyPair<B>>, ProofError> {
        let slot = self.slot(shape);

        if let Some(keys) = slot.get() {
            debug!("key store hit for {}", shape);
            return Ok(keys.clone());
        }

        let keys = slot.get_or_try_init(|| {
            debug!("key store miss for {}, running setup", shape);
            self.setups_run.fetch_add(1, Ordering::SeqCst);

            let (proving_key, verifying_key) = self.backend.setup(WithdrawalCircuit::blank(shape))?;
            Ok::<_, ProofError>(Arc::new(KeyPair {
                shape,
                proving_key,
                verifying_key,
            }))
        })?;

        Ok(keys.clone())
    }

    /// Keys for `shape` if already present
    pub fn get(&self, shape: CircuitShape) -> Option<Arc<KeyPair<B>>> {
        self.slot(shape).get().cloned()
    }

    /// Keys to check proofs for `shape` against
    ///
    /// Setup only runs when the backend reproduces the same keys every time.
    /// Otherwise fresh keys could never match the ones the prover used.
    pub fn verifying_keys(&self, shape: CircuitShape) -> Result<Arc<KeyPair<B>>, ProofError> {
        if let Some(keys) = self.get(shape) {
            return Ok(keys);
        }
        if self.backend.reproducible_setup() {
            return self.get_or_setup(shape);
        }
        Err(ProofError::KeysUnavailable(shape.to_string()))
    }

    /// Install pre-generated keys; fails if the shape already has keys
    pub fn insert(&self, keys: KeyPair<B>) -> Result<Arc<KeyPair<B>>, ProofError> {
        let shape = keys.shape;
        let keys = Arc::new(keys);

        self.slot(shape)
            .set(keys.clone())
            .map_err(|_| ProofError::SetupFailed(format!("keys for {} are already present", shape)))?;

        debug!("key store loaded keys for {}", shape);
        Ok(keys)
    }

    pub fn contains(&self, shape: CircuitShape) -> bool {
        self.get(shape).is_some()
    }

    /// How many setups this store has started
    pub fn setups_run(&self) -> usize {
        self.setups_run.load(Ordering::SeqCst)
    }
}

impl Default for KeyStore<Groth16Backend> {
    fn default() -> Self {
        Self::new(Groth16Backend::new())
    }
}

/// Groth16 key stores shared by setup seed
///
/// Pipelines created with the same `setup_seed` share one store; an unseeded
/// pipeline never picks up keys derived from a seed, nor the reverse.
#[derive(Default)]
pub struct SeededKeyStores {
    stores: Mutex<HashMap<Option<u64>, Arc<KeyStore<Groth16Backend>>>>,
}

impl SeededKeyStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_seed(&self, seed: Option<u64>) -> Arc<KeyStore<Groth16Backend>> {
        let mut stores = self.stores.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        stores
            .entry(seed)
            .or_insert_with(|| Arc::new(KeyStore::new(Groth16Backend::from_seed(seed))))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commitment::AssetBinding;

    #[test]
    fn test_setup_runs_once_per_shape() {
        let store = KeyStore::new(Groth16Backend::with_setup_seed(7));
        let shape = CircuitShape::new(2, AssetBinding::Bound);

        assert!(!store.contains(shape));
        let first = store.get_or_setup(shape).unwrap();
        let second = store.get_or_setup(shape).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.setups_run(), 1);
        assert_eq!(store.backend().public_input_count(&first.verifying_key), 4);
    }

    #[test]
    fn test_key_serialization_round_trip() {
        let store = KeyStore::new(Groth16Backend::with_setup_seed(7));
        let shape = CircuitShape::new(1, AssetBinding::Unbound);
        let keys = store.get_or_setup(shape).unwrap();

        let pk = keys.serialize_proving_key().unwrap();
        let vk = keys.serialize_verifying_key().unwrap();
        let loaded = KeyPair::from_bytes(shape, &pk, &vk).unwrap();

        assert_eq!(loaded.raw_verifying_key(), keys.raw_verifying_key());

        let other = KeyStore::default();
        other.insert(loaded).unwrap();
        assert!(other.contains(shape));
        assert_eq!(other.setups_run(), 0);
    }

    #[test]
    fn test_insert_twice_fails() {
        let store = KeyStore::new(Groth16Backend::with_setup_seed(7));
        let shape = CircuitShape::new(1, AssetBinding::Unbound);
        let keys = store.get_or_setup(shape).unwrap();

        let pk = keys.serialize_proving_key().unwrap();
        let vk = keys.serialize_verifying_key().unwrap();

        assert!(store.insert(KeyPair::from_bytes(shape, &pk, &vk).unwrap()).is_err());
    }

    #[test]
    fn test_verifying_keys_without_seed_never_runs_setup() {
        let store = KeyStore::default();
        let shape = CircuitShape::new(1, AssetBinding::Bound);

        assert!(matches!(store.verifying_keys(shape), Err(ProofError::KeysUnavailable(_))));
        assert_eq!(store.setups_run(), 0);

        // Loaded keys are used as they are
        let seeded = KeyStore::new(Groth16Backend::with_setup_seed(3));
        let keys = seeded.get_or_setup(shape).unwrap();
        let pk = keys.serialize_proving_key().unwrap();
        let vk = keys.serialize_verifying_key().unwrap();
        store.insert(KeyPair::from_bytes(shape, &pk, &vk).unwrap()).unwrap();

        assert!(store.verifying_keys(shape).is_ok());
        assert_eq!(store.setups_run(), 0);
    }

    #[test]
    fn test_verifying_keys_with_seed_runs_setup() {
        let store = KeyStore::new(Groth16Backend::with_setup_seed(3));
        let shape = CircuitShape::new(1, AssetBinding::Unbound);

        let keys = store.verifying_keys(shape).unwrap();
        assert_eq!(store.setups_run(), 1);
        assert!(Arc::ptr_eq(&keys, &store.get_or_setup(shape).unwrap()));
    }

    #[test]
    fn test_seeded_stores_are_kept_apart() {
        let stores = SeededKeyStores::new();

        assert!(Arc::ptr_eq(&stores.for_seed(Some(5)), &stores.for_seed(Some(5))));
        assert!(!Arc::ptr_eq(&stores.for_seed(Some(5)), &stores.for_seed(None)));
        assert_eq!(stores.for_seed(Some(5)).backend().setup_seed(), Some(5));
        assert_eq!(stores.for_seed(None).backend().setup_seed(), None);
    }

    #[test]
    fn test_corrupt_keys_rejected() {
        let shape = CircuitShape::new(1, AssetBinding::Unbound);
        assert!(matches!(
            KeyPair::from_bytes(shape, &[1, 2, 3], &[4, 5, 6]),
            Err(ProofError::InvalidProvingKey)
        ));
    }
}
