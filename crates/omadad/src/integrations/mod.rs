pub mod omada;
