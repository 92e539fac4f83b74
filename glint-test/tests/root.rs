mod binders;
mod buffers;
mod info;
mod programs;
mod textures;
mod uniforms;
mod vertex_arrays;
