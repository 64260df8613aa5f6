mod geometry;
mod system;

pub use geometry::{CenterOfGeometry, Displacement, Radgyr, RmsdFirst};
pub use system::{BoxVolume, MeanBondLength, Temperature};

use traj_core::error::TrajResult;

use crate::action::Action;
use crate::registry::RegistryBuilder;

fn boxed<A: Action + Default + 'static>() -> TrajResult<Box<dyn Action>> {
    Ok(Box::new(A::default()))
}

pub(crate) fn register_builtins(builder: &mut RegistryBuilder<dyn Action>) -> TrajResult<()> {
    builder.register("radgyr", boxed::<Radgyr>)?;
    builder.register("center_of_geometry", boxed::<CenterOfGeometry>)?;
    builder.register("displacement", boxed::<Displacement>)?;
    builder.register("rmsd_first", boxed::<RmsdFirst>)?;
    builder.register("box_volume", boxed::<BoxVolume>)?;
    builder.register("mean_bond_length", boxed::<MeanBondLength>)?;
    builder.register("temperature", boxed::<Temperature>)?;
    Ok(())
}
