pub mod lowering;
