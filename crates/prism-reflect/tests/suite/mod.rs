mod caching;
mod fixture;
mod inheritance;
mod resolution;
mod types;
