pub(crate) mod db;
pub(crate) mod session;
pub(crate) mod shitsumon;
pub(crate) mod uta;
