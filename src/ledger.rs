use chrono::{DateTime, Utc};
use crate::db::BlobStore;
use crate::error::{LedgerError, Result};
use crate::model::{Material, Purchase};

pub const MATERIALS_KEY: &str = "materials";
pub const PURCHASES_KEY: &str = "purchases";

/// What happens to purchases that reference a material being removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovePolicy {
    /// Refuse while any purchase references the material.
    #[default]
    Restrict,
    /// Remove the material and every purchase referencing it.
    Cascade,
}

/// A removed material together with any purchases removed alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedMaterial {
    pub material: Material,
    pub purchases: Vec<Purchase>,
}

#[derive(Debug, Clone, Default)]
struct State {
    materials: Vec<Material>,
    purchases: Vec<Purchase>,
    next_material_id: i64,
    last_purchase_id: i64,
}

impl State {
    fn material_mut(&mut self, id: i64) -> Result<&mut Material> {
        self.materials
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(LedgerError::UnknownMaterial { id })
    }

    /// Purchase ids are millisecond timestamps, bumped so they never repeat.
    fn next_purchase_id(&mut self) -> i64 {
        let id = Utc::now().timestamp_millis().max(self.last_purchase_id + 1);
        self.last_purchase_id = id;
        id
    }
}

/// Owns the material and purchase collections and keeps them consistent.
///
/// Every mutation is applied to a copy of the current state, both collections
/// are written to the store in one `save_all` call, and the copy replaces the
/// live state only after the write succeeded.
pub struct Ledger<S> {
    store: S,
    state: State,
}

impl<S: BlobStore> Ledger<S> {
    /// Loads both collections from `store`. Missing keys start empty.
    pub fn open(store: S) -> Result<Self> {
        let materials: Vec<Material> = match store.load(MATERIALS_KEY)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };
        let purchases: Vec<Purchase> = match store.load(PURCHASES_KEY)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };

        let next_material_id = materials.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        let last_purchase_id = purchases.iter().map(|p| p.id).max().unwrap_or(0);
        log::debug!(
            "ledger opened with {} materials and {} purchases",
            materials.len(),
            purchases.len()
        );

        Ok(Ledger {
            store,
            state: State { materials, purchases, next_material_id, last_purchase_id },
        })
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Materials in creation order.
    pub fn materials(&self) -> &[Material] {
        &self.state.materials
    }

    /// Purchases in insertion order.
    pub fn purchases(&self) -> &[Purchase] {
        &self.state.purchases
    }

    pub fn material(&self, id: i64) -> Option<&Material> {
        self.state.materials.iter().find(|m| m.id == id)
    }

    pub fn purchase(&self, id: i64) -> Option<&Purchase> {
        self.state.purchases.iter().find(|p| p.id == id)
    }

    /// Registers a new material with zero stock. Names must be non-blank and
    /// are compared case-sensitively against current materials.
    pub fn add_material(&mut self, name: &str) -> Result<Material> {
        if name.trim().is_empty() {
            log::warn!("rejected material with empty name");
            return Err(LedgerError::EmptyName);
        }
        if self.state.materials.iter().any(|m| m.name == name) {
            log::warn!("rejected duplicate material {name:?}");
            return Err(LedgerError::DuplicateName { name: name.to_string() });
        }

        let mut next = self.state.clone();
        let material = Material::new(next.next_material_id, name);
        next.next_material_id += 1;
        next.materials.push(material.clone());
        self.commit(next)?;

        log::info!("added material {} ({})", material.id, material.name);
        Ok(material)
    }

    /// Blends a weight delta at a unit price into the material's running
    /// average and returns the updated material.
    pub fn update_material(&mut self, id: i64, delta_weight: f64, delta_price: f64) -> Result<Material> {
        if !delta_weight.is_finite() {
            return Err(LedgerError::InvalidWeight { weight: delta_weight });
        }
        if !delta_price.is_finite() {
            return Err(LedgerError::InvalidPrice { price: delta_price });
        }

        let mut next = self.state.clone();
        let material = next.material_mut(id)?;
        material.blend(delta_weight, delta_price);
        let updated = material.clone();
        self.commit(next)?;

        log::info!(
            "material {} now {:.3} kg at {:.4}/kg",
            updated.id,
            updated.weight,
            updated.price_per_kg
        );
        Ok(updated)
    }

    pub fn remove_material(&mut self, id: i64, policy: RemovePolicy) -> Result<RemovedMaterial> {
        let referencing = self.state.purchases.iter().filter(|p| p.material_id == id).count();
        if self.material(id).is_none() {
            return Err(LedgerError::UnknownMaterial { id });
        }
        if referencing > 0 && policy == RemovePolicy::Restrict {
            log::warn!("material {id} still referenced by {referencing} purchase(s)");
            return Err(LedgerError::MaterialInUse { id, purchases: referencing });
        }

        let mut next = self.state.clone();
        let pos = next
            .materials
            .iter()
            .position(|m| m.id == id)
            .ok_or(LedgerError::UnknownMaterial { id })?;
        let material = next.materials.remove(pos);
        let (purchases, kept): (Vec<Purchase>, Vec<Purchase>) =
            next.purchases.into_iter().partition(|p| p.material_id == id);
        next.purchases = kept;
        self.commit(next)?;

        log::info!(
            "removed material {} ({}) and {} purchase(s)",
            material.id,
            material.name,
            purchases.len()
        );
        Ok(RemovedMaterial { material, purchases })
    }

    /// Records a purchase and blends it into the material's stock.
    pub fn add_purchase(
        &mut self,
        material_id: i64,
        weight: f64,
        price_per_kg: f64,
        date: DateTime<Utc>,
    ) -> Result<Purchase> {
        if !weight.is_finite() || weight <= 0.0 {
            log::warn!("rejected purchase weight {weight}");
            return Err(LedgerError::InvalidWeight { weight });
        }
        if !price_per_kg.is_finite() || price_per_kg < 0.0 {
            log::warn!("rejected purchase price {price_per_kg}");
            return Err(LedgerError::InvalidPrice { price: price_per_kg });
        }

        let mut next = self.state.clone();
        next.material_mut(material_id)?.blend(weight, price_per_kg);
        let purchase = Purchase::new(next.next_purchase_id(), material_id, date, weight, price_per_kg);
        next.purchases.push(purchase.clone());
        self.commit(next)?;

        log::info!(
            "recorded purchase {}: {:.3} kg of material {} at {:.2}/kg",
            purchase.id,
            purchase.weight,
            purchase.material_id,
            purchase.price_per_kg
        );
        Ok(purchase)
    }

    /// Removes a purchase and reverses its effect on the owning material.
    pub fn remove_purchase(&mut self, id: i64) -> Result<Purchase> {
        let mut next = self.state.clone();
        let pos = next
            .purchases
            .iter()
            .position(|p| p.id == id)
            .ok_or(LedgerError::UnknownPurchase { id })?;
        let purchase = next.purchases.remove(pos);

        match next.material_mut(purchase.material_id) {
            Ok(material) => material.unblend(purchase.weight, purchase.price_per_kg),
            Err(_) => log::warn!(
                "purchase {} references missing material {}",
                purchase.id,
                purchase.material_id
            ),
        }
        self.commit(next)?;

        log::info!("removed purchase {}", purchase.id);
        Ok(purchase)
    }

    fn commit(&mut self, next: State) -> Result<()> {
        let materials = serde_json::to_string(&next.materials)?;
        let purchases = serde_json::to_string(&next.purchases)?;
        self.store
            .save_all(&[(MATERIALS_KEY, materials), (PURCHASES_KEY, purchases)])?;
        self.state = next;
        Ok(())
    }
}
