use std::sync::Arc;

use graphser_core::{Codec, ReadContext, Result, WriteContext};

use crate::property_bag::PropertyBag;

/// Named property scopes, several of which may share one bag.
///
/// A project that inherits its build's properties holds the same `Arc` as
/// the build scope, and a round trip keeps it that way.
#[derive(Debug, Clone, Default)]
pub struct PropertySnapshot {
    scopes: Vec<(String, Arc<PropertyBag>)>,
}

impl PropertySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: impl Into<String>, bag: Arc<PropertyBag>) {
        self.scopes.push((scope.into(), bag));
    }

    /// Bag of the first scope named `scope`.
    pub fn scope(&self, scope: &str) -> Option<&Arc<PropertyBag>> {
        self.scopes
            .iter()
            .find(|(name, _)| name == scope)
            .map(|(_, bag)| bag)
    }

    pub fn scopes(&self) -> &[(String, Arc<PropertyBag>)] {
        &self.scopes
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// `[varint count]([string scope][tagged bag])*`
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertySnapshotCodec;

impl Codec for PropertySnapshotCodec {
    type Value = PropertySnapshot;

    fn encode(&self, ctx: &mut WriteContext<'_>, value: &PropertySnapshot) -> Result<()> {
        ctx.write_varint(value.scopes.len() as u64)?;
        for (scope, bag) in &value.scopes {
            ctx.write_str(scope)?;
            ctx.write_value(bag)?;
        }
        Ok(())
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> Result<PropertySnapshot> {
        let count = ctx.read_len(2)?;
        let mut snapshot = PropertySnapshot::new();
        for _ in 0..count {
            let scope = ctx.read_string()?;
            let bag = ctx.read_value_as::<Arc<PropertyBag>>()?;
            snapshot.push(scope, bag);
        }
        Ok(snapshot)
    }
}
