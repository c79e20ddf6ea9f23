pub mod dadosrio;
