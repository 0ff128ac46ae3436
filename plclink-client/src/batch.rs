//! Batch request items and their responses.
//!
//! Every item carries a caller token `K`. The connection never looks inside
//! it; response item *i* is paired with the token of request item *i*.

use crate::error::ClientError;
use chrono::{DateTime, Utc};
use plclink_protocol::{Address, DataType, ItemSpec, PlcType, PlcValue};

/// Outcome of one read item.
pub type ItemOutcome = Result<Vec<PlcValue>, ClientError>;

/// One item of a batched read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadItem<K> {
    pub token: K,
    pub spec: ItemSpec,
}

impl<K> ReadItem<K> {
    pub fn new(token: K, spec: ItemSpec) -> Self {
        Self { token, spec }
    }

    /// Parses `address` and reads one element of `data_type` from it.
    pub fn parse(token: K, address: &str, data_type: DataType) -> Result<Self, ClientError> {
        let address = Address::parse(address)?;
        Ok(Self::new(token, ItemSpec::new(address, data_type)))
    }

    /// Parses `address` and reads one element of the type matching `T`.
    pub fn typed<T: PlcType>(token: K, address: &str) -> Result<Self, ClientError> {
        Self::parse(token, address, T::DATA_TYPE)
    }

    /// Sets the element count. A zero count is rejected when the batch is
    /// submitted.
    pub fn with_count(mut self, count: u16) -> Self {
        self.spec.count = count;
        self
    }
}

/// Per-item results of a batched read, in request order.
#[derive(Debug, Clone)]
pub struct ReadResponse<K> {
    items: Vec<(K, ItemOutcome)>,
    received_at: DateTime<Utc>,
}

impl<K> ReadResponse<K> {
    pub fn new(items: Vec<(K, ItemOutcome)>) -> Self {
        Self {
            items,
            received_at: Utc::now(),
        }
    }

    /// When the response was received.
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Token and outcome of item `index`.
    pub fn get(&self, index: usize) -> Option<(&K, &ItemOutcome)> {
        self.items
            .get(index)
            .map(|(token, outcome)| (token, outcome))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &ItemOutcome)> {
        self.items.iter().map(|(token, outcome)| (token, outcome))
    }

    /// Number of items the device answered successfully.
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|(_, outcome)| outcome.is_ok()).count()
    }

    pub fn into_items(self) -> Vec<(K, ItemOutcome)> {
        self.items
    }

    /// Converts every successful item to `T`.
    ///
    /// An item holding a value of another type fails with
    /// [`ClientError::InvalidValue`]; failed items keep their error.
    pub fn typed<T: PlcType>(&self) -> Vec<(&K, Result<Vec<T>, ClientError>)> {
        self.iter()
            .map(|(token, outcome)| {
                let converted = match outcome {
                    Ok(values) => T::from_values(values.clone()).map_err(ClientError::from),
                    Err(err) => Err(err.clone()),
                };
                (token, converted)
            })
            .collect()
    }
}

impl<K: PartialEq> ReadResponse<K> {
    /// Outcome of the first item carrying `token`.
    pub fn find(&self, token: &K) -> Option<&ItemOutcome> {
        self.items
            .iter()
            .find(|(candidate, _)| candidate == token)
            .map(|(_, outcome)| outcome)
    }
}

/// One item of a batched write. Values are validated on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteItem<K> {
    token: K,
    address: Address,
    data_type: DataType,
    values: Vec<PlcValue>,
}

impl<K> WriteItem<K> {
    /// Creates a write item.
    ///
    /// Fails with [`ClientError::InvalidValue`] when `values` is empty or
    /// mixes data types.
    pub fn new(token: K, address: Address, values: Vec<PlcValue>) -> Result<Self, ClientError> {
        let Some(first) = values.first() else {
            return Err(ClientError::InvalidValue(format!(
                "no values to write to {}",
                address
            )));
        };
        let data_type = first.data_type();
        if let Some(other) = values.iter().find(|v| v.data_type() != data_type) {
            return Err(ClientError::InvalidValue(format!(
                "mixed value types for {}: {} and {}",
                address,
                data_type,
                other.data_type()
            )));
        }
        Ok(Self {
            token,
            address,
            data_type,
            values,
        })
    }

    /// Creates a write item from native values.
    pub fn typed<T: PlcType>(
        token: K,
        address: Address,
        values: Vec<T>,
    ) -> Result<Self, ClientError> {
        Self::new(token, address, values.into_iter().map(Into::into).collect())
    }

    pub fn token(&self) -> &K {
        &self.token
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn values(&self) -> &[PlcValue] {
        &self.values
    }

    pub(crate) fn into_parts(self) -> (K, Address, DataType, Vec<PlcValue>) {
        (self.token, self.address, self.data_type, self.values)
    }
}

/// Per-item results of a batched write, in request order.
#[derive(Debug, Clone)]
pub struct WriteResponse<K> {
    items: Vec<(K, Result<(), ClientError>)>,
    received_at: DateTime<Utc>,
}

impl<K> WriteResponse<K> {
    pub fn new(items: Vec<(K, Result<(), ClientError>)>) -> Self {
        Self {
            items,
            received_at: Utc::now(),
        }
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Result<(), ClientError>)> {
        self.items.iter().map(|(token, outcome)| (token, outcome))
    }

    /// Whether every item was written.
    pub fn all_ok(&self) -> bool {
        self.items.iter().all(|(_, outcome)| outcome.is_ok())
    }

    pub fn into_items(self) -> Vec<(K, Result<(), ClientError>)> {
        self.items
    }
}
