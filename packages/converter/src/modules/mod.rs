//! One converter module per era of the file format, oldest first.

pub mod lyx_0_06;
pub mod lyx_0_08;
pub mod lyx_0_10;
pub mod lyx_0_12;
pub mod lyx_1_0;
pub mod lyx_1_1;
pub mod lyx_1_1_5;
pub mod lyx_1_1_6_0;
pub mod lyx_1_1_6_3;
pub mod lyx_1_2;
pub mod lyx_1_3;
pub mod lyx_1_4;
pub mod lyx_1_5;
