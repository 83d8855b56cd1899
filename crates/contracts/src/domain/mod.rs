pub mod a001_shop_credential;
pub mod a002_sync_process;
