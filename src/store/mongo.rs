//! Mongo wire protocol store (Azure Cosmos DB's API for MongoDB, or plain MongoDB).

use mongodb::{
    bson::{doc, Document},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, InsertManyOptions, Tls, TlsOptions},
    Client, Collection,
};
use observations::WeatherStationObservation;

use super::{ObservationStore, RecordError, StoreError};
use crate::core::config::DataStoreConfig;

pub struct MongoStore {
    collection: Collection<Document>,
}

impl MongoStore {
    /// Connect and check that the database answers.
    ///
    /// Retryable writes are turned off: Cosmos does not support them, and retrying is the
    /// loader's job.
    #[instrument(skip_all, fields(database = %config.database_name, collection = %config.collection_name))]
    pub async fn connect(config: &DataStoreConfig) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&config.connection_string)
            .await
            .map_err(|e| {
                error!("Failed to connect to the datastore (configuration)");
                StoreError::Connection(e.to_string())
            })?;
        options.retry_writes = Some(false);
        options.tls = Some(if config.use_tls {
            Tls::Enabled(TlsOptions::default())
        } else {
            Tls::Disabled
        });
        debug!(
            "Data store hosts: {:?}; using TLS: {}",
            options.hosts, config.use_tls
        );

        let client = Client::with_options(options).map_err(map_error)?;
        let database = client.database(&config.database_name);
        debug!("Accessing database {}", config.database_name);
        database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                error!("Failed to connect to the datastore: {e}");
                map_error(e)
            })?;

        Ok(Self {
            collection: database.collection(&config.collection_name),
        })
    }
}

#[async_trait]
impl ObservationStore for MongoStore {
    async fn count_by_id(&self, id: &str) -> Result<u64, StoreError> {
        self.collection
            .count_documents(doc! { "_id": id }, None)
            .await
            .map_err(map_error)
    }

    async fn insert_many(&self, records: &[WeatherStationObservation]) -> Result<(), StoreError> {
        let docs = records
            .iter()
            .map(|r| mongodb::bson::to_document(&r.stored()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Encode(e.to_string()))?;
        let options = InsertManyOptions::builder().ordered(true).build();
        match self.collection.insert_many(docs, options).await {
            Ok(_) => Ok(()),
            Err(e) => Err(map_insert_error(e, records.len())),
        }
    }
}

fn map_insert_error(err: MongoError, batch_len: usize) -> StoreError {
    let ErrorKind::BulkWrite(failure) = err.kind.as_ref() else {
        return map_error(err);
    };
    let write_errors = failure
        .write_errors
        .iter()
        .flatten()
        .map(|we| RecordError {
            index: we.index,
            code: we.code,
            message: we.message.clone(),
        })
        .collect();
    let write_concern = failure
        .write_concern_error
        .as_ref()
        .map(|wce| (wce.code, wce.message.clone()));
    StoreError::from_ordered_insert(write_errors, write_concern, batch_len)
}

fn map_error(err: MongoError) -> StoreError {
    match err.kind.as_ref() {
        ErrorKind::Command(cmd) => StoreError::Command {
            code: cmd.code,
            message: cmd.message.clone(),
        },
        ErrorKind::Write(WriteFailure::WriteError(we)) => StoreError::Command {
            code: we.code,
            message: we.message.clone(),
        },
        ErrorKind::Authentication { .. }
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::DnsResolve { .. } => StoreError::Connection(err.to_string()),
        _ => StoreError::Command {
            code: 0,
            message: err.to_string(),
        },
    }
}
