//! Services on top of the store traits.
//!
//! [`LedgerService`] owns every balance-affecting mutation.
//! [`RecurringService`] manages recurring transaction definitions and their
//! reminders. Both are generic over the store and share it through an `Arc`.

use std::sync::Arc;

use crate::{EngineConfig, EngineError, ResultEngine};

mod ledger;
mod recurring;
mod reminders;

pub(crate) use reminders::schedule_reminder;

#[derive(Debug)]
pub struct LedgerService<S> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S> Clone for LedgerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
        }
    }
}

impl<S> LedgerService<S> {
    /// Return a builder for `LedgerService`. Help to build the struct.
    pub fn builder() -> ServiceBuilder<S> {
        ServiceBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

#[derive(Debug)]
pub struct RecurringService<S> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S> Clone for RecurringService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
        }
    }
}

impl<S> RecurringService<S> {
    /// Return a builder for `RecurringService`. Help to build the struct.
    pub fn builder() -> ServiceBuilder<S> {
        ServiceBuilder::default()
    }
}

/// The builder for the services.
#[derive(Debug)]
pub struct ServiceBuilder<S> {
    store: Option<Arc<S>>,
    config: EngineConfig,
}

impl<S> Default for ServiceBuilder<S> {
    fn default() -> Self {
        Self {
            store: None,
            config: EngineConfig::default(),
        }
    }
}

impl<S> ServiceBuilder<S> {
    /// Pass the required store
    pub fn store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    fn parts(self) -> ResultEngine<(Arc<S>, EngineConfig)> {
        let store = self
            .store
            .ok_or_else(|| EngineError::InvalidState("service built without a store".to_string()))?;
        Ok((store, self.config))
    }

    /// Construct `LedgerService`
    pub fn build_ledger(self) -> ResultEngine<LedgerService<S>> {
        let (store, config) = self.parts()?;
        Ok(LedgerService { store, config })
    }

    /// Construct `RecurringService`
    pub fn build_recurring(self) -> ResultEngine<RecurringService<S>> {
        let (store, config) = self.parts()?;
        Ok(RecurringService { store, config })
    }
}
