pub mod derived_asset;
