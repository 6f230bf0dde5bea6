mod floorplan;
mod fm;
