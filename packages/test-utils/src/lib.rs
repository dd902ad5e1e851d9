pub mod datagen;
