pub mod statuswatch;
