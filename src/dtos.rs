pub mod categorydtos;
pub mod taskdtos;
pub mod userdtos;
pub mod walletdtos;
