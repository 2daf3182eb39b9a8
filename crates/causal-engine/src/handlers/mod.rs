mod get;
mod kvs_response;
mod put;
mod respond;
mod versioned_key;
