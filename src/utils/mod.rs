pub mod trig;
