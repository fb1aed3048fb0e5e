use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ahash::{HashMap, HashMapExt};
use futures::future::{BoxFuture, FutureExt};
use meridian_types::cartesian::{Point2, Rect};
use meridian_types::Geom;
use parking_lot::RwLock;

use super::{HitMatch, LayerRenderer};
use crate::error::MeridianError;
use crate::feature::{Feature, FeatureKey};
use crate::frame::FrameState;
use crate::layer::{RenderMode, VectorTileLayer};
use crate::projection::{wrap_coordinate_x, Projection};
use crate::render::{
    BuilderGroup, DeclutterTree, DrawingSurface, ExecutorGroup, Path, Transform,
};
use crate::source::{BuilderPhase, TileImage, TileState, VectorRenderTile, VectorTileSource};
use crate::style::{default_style, IconState, ImageStyle, Style};
use crate::tile_grid::{TileCoord, TileGrid, TileRange};

/// Renderer of a [`VectorTileLayer`].
///
/// In every frame the renderer selects the render tiles covering the view, builds their executor groups from the
/// features of the source tiles and draws them. Tiles that are not ready yet are substituted by already built
/// tiles of other zoom levels. When tiles of different zoom levels overlap, the parts of lower zoom tiles covered
/// by higher zoom ones are clipped out, so that semi-transparent symbols are never drawn twice.
///
/// The renderer owns its layer. Everything it builds is stored in the render tiles of the source, under the id of
/// the layer. Between frames the renderer keeps only the coordinates of the tiles it rendered.
#[derive(Debug)]
pub struct VectorTileLayerRenderer {
    layer: VectorTileLayer,
    rendered_tiles: Vec<TileCoord>,
    rendered_revision: Option<u64>,
    rendered_projection: Option<Projection>,
    rendered_resolution: Option<f64>,
    rendered_rotation: f64,
    rendered_pixel_to_coordinate: Option<Transform>,
    ready: bool,
}

impl VectorTileLayerRenderer {
    /// Creates a renderer for the layer.
    pub fn new(layer: VectorTileLayer) -> Self {
        Self {
            layer,
            rendered_tiles: vec![],
            rendered_revision: None,
            rendered_projection: None,
            rendered_resolution: None,
            rendered_rotation: 0.0,
            rendered_pixel_to_coordinate: None,
            ready: false,
        }
    }

    /// The rendered layer.
    pub fn layer(&self) -> &VectorTileLayer {
        &self.layer
    }

    /// Mutable access to the rendered layer.
    pub fn layer_mut(&mut self) -> &mut VectorTileLayer {
        &mut self.layer
    }

    /// Returns true if no tile drawn in the last frame waits for a rebuild.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Coordinates of the tiles selected for the last frame, in ascending zoom order.
    pub fn rendered_tiles(&self) -> &[TileCoord] {
        &self.rendered_tiles
    }

    /// Places the labels and icons of the rendered tiles, skipping the ones colliding with already placed items.
    ///
    /// Uses the declutter tree of the frame, so that items of all layers of the frame compete for space. If the
    /// frame has no tree, the layer is decluttered on its own.
    pub fn render_declutter(&self, frame_state: &mut FrameState, surface: &mut dyn DrawingSurface) {
        if !self.layer.declutter() {
            return;
        }

        let Some(projection) = &self.rendered_projection else {
            return;
        };
        let grid = match self.layer.source().tile_grid_for_projection(projection) {
            Ok(grid) => grid,
            Err(err) => {
                log::warn!("Cannot declutter layer {:?}: {err}", self.layer.id());
                return;
            }
        };

        let mut tree = frame_state.declutter_tree.take().unwrap_or_default();
        let alpha = surface.global_alpha();
        surface.set_global_alpha(self.layer.opacity());

        let layer_id = self.layer.id();
        for tile in self.rendered_tile_refs(projection) {
            let tile = tile.read();
            let Ok(transform) = tile_render_transform(&tile, &grid, frame_state) else {
                continue;
            };
            for group in tile.declutter_executor_groups(layer_id).iter().rev() {
                group.execute(
                    surface,
                    frame_state.pixel_ratio,
                    &transform,
                    frame_state.view.rotation(),
                    frame_state.is_hifi(),
                    None,
                    Some(&mut tree),
                );
            }
        }

        surface.set_global_alpha(alpha);
        frame_state.declutter_tree = Some(tree);
    }

    /// Features drawn at the pixel of the last rendered frame, topmost first.
    ///
    /// Resolves to an empty list if the tile at the pixel is not loaded.
    pub fn get_features(&self, pixel: &Point2) -> BoxFuture<'static, Vec<Arc<Feature>>> {
        let features = match self.features_at_pixel(pixel) {
            Ok(features) => features,
            Err(err) => {
                log::debug!("Hit detection at {pixel:?} failed: {err}");
                vec![]
            }
        };

        futures::future::ready(features).boxed()
    }

    fn features_at_pixel(&self, pixel: &Point2) -> Result<Vec<Arc<Feature>>, MeridianError> {
        let (Some(projection), Some(resolution), Some(to_coordinate)) = (
            &self.rendered_projection,
            self.rendered_resolution,
            &self.rendered_pixel_to_coordinate,
        ) else {
            return Ok(vec![]);
        };

        let source = self.layer.source();
        let grid = source.tile_grid_for_projection(projection)?;
        let mut coordinate = to_coordinate.apply(pixel);
        let tile_coord = grid.get_tile_coord_for_coord_and_resolution(&coordinate, resolution)?;
        if !self.rendered_tiles.contains(&tile_coord) {
            return Ok(vec![]);
        }

        let Some(tile) = source.cached_tile(tile_coord, projection) else {
            return Ok(vec![]);
        };
        let tile = tile.read();
        if tile.state() != TileState::Loaded || tile.loading_source_tiles() > 0 {
            return Ok(vec![]);
        }
        if source.wrap_x() {
            coordinate = wrap_coordinate_x(&coordinate, projection);
        }

        let layer_id = self.layer.id();
        let mut features: Vec<Arc<Feature>> = vec![];
        let mut collect = |feature: &Arc<Feature>, _: &Geom, _: f64| {
            if !features.iter().any(|f| f.key() == feature.key()) {
                features.push(feature.clone());
            }
            false
        };
        let groups = tile
            .declutter_executor_groups(layer_id)
            .iter()
            .chain(tile.executor_groups(layer_id));
        for group in groups {
            group.for_each_feature_at_coordinate(
                &coordinate,
                resolution,
                self.rendered_rotation,
                0.0,
                &mut collect,
                None,
            );
        }

        Ok(features)
    }

    fn rendered_tile_refs(&self, projection: &Projection) -> Vec<Arc<RwLock<VectorRenderTile>>> {
        let source = self.layer.source();
        self.rendered_tiles
            .iter()
            .filter_map(|tile_coord| source.cached_tile(*tile_coord, projection))
            .collect()
    }

    fn prepare_tiles(&mut self, frame_state: &FrameState) -> Result<bool, MeridianError> {
        let view = &frame_state.view;
        let projection = view.projection();
        let source = self.layer.source().clone();
        let grid = source.tile_grid_for_projection(projection)?;
        let z = grid.get_z_for_resolution(view.resolution(), source.z_direction());
        let tile_range = grid.get_tile_range_for_extent_and_z(&frame_state.extent(), z)?;

        let mut tiles_by_z: BTreeMap<u32, BTreeSet<TileCoord>> = BTreeMap::new();
        let mut ready = true;
        for tile_coord in tile_range.iter_coords(z) {
            let tile = source.get_tile(tile_coord, projection)?;
            let drawable = {
                let mut tile = tile.write();
                self.prepare_tile(&source, &mut tile, &grid, frame_state)?;

                let state = tile.state();
                let builder_state = tile.builder_state(self.layer.id());
                let built = builder_state.phase(
                    self.layer.revision(),
                    grid.get_resolution(z)?,
                    self.render_order_id(),
                ) == BuilderPhase::Built;
                ready &= state.is_settled() && (state != TileState::Loaded || built);

                let drawable = self.is_drawable(&tile);
                if drawable && state == TileState::Loaded {
                    tiles_by_z.entry(z).or_default().insert(tile_coord);
                }
                drawable
            };

            if drawable {
                continue;
            }

            let covered = grid.child_tile_range(&tile_coord).is_some_and(|range| {
                self.find_loaded_tiles(&source, projection, z + 1, &range, &mut tiles_by_z)
            });
            if !covered {
                for (parent_z, range) in grid.parent_tile_ranges(&tile_coord) {
                    if self.find_loaded_tiles(&source, projection, parent_z, &range, &mut tiles_by_z)
                    {
                        break;
                    }
                }
            }
        }

        self.rendered_tiles = tiles_by_z.into_values().flatten().collect();
        Ok(ready)
    }

    fn prepare_tile(
        &self,
        source: &VectorTileSource,
        tile: &mut VectorRenderTile,
        grid: &TileGrid,
        frame_state: &FrameState,
    ) -> Result<(), MeridianError> {
        let projection = frame_state.view.projection();
        if tile.state() == TileState::Idle {
            source.load_tile(tile, projection)?;
        }

        if tile.state() != TileState::Loaded {
            return Ok(());
        }

        let resolution = grid.get_resolution(tile.tile_coord().z)?;
        let phase = tile.builder_state(self.layer.id()).phase(
            self.layer.revision(),
            resolution,
            self.render_order_id(),
        );
        if phase != BuilderPhase::Built {
            self.update_executor_groups(source, tile, grid, resolution, frame_state.pixel_ratio)?;
        }

        if frame_state.is_hifi() || tile.wanted_resolution().is_none() {
            tile.set_wanted_resolution(frame_state.view.resolution());
        }

        Ok(())
    }

    fn update_executor_groups(
        &self,
        source: &VectorTileSource,
        tile: &mut VectorRenderTile,
        grid: &TileGrid,
        resolution: f64,
        pixel_ratio: f64,
    ) -> Result<(), MeridianError> {
        let Some(wrapped) = tile.wrapped_tile_coord() else {
            return Ok(());
        };

        let layer_id = self.layer.id();
        log::trace!(
            "Building executor groups of tile {} for layer {layer_id:?} at resolution {resolution}",
            tile.tile_coord()
        );

        let declutter = self.layer.declutter();
        let render_buffer = self.layer.render_buffer();
        let render_order = self.layer.render_order();
        let previous_order = tile.builder_state(layer_id).rendered_render_order;
        let style_function = self
            .layer
            .style()
            .cloned()
            .unwrap_or_else(default_style);
        let tile_extent = grid.get_tile_coord_extent(&wrapped)?;
        let squared_tolerance = (0.5 * resolution / pixel_ratio).powi(2);
        let source_tiles = tile.source_tiles().to_vec();

        let mut dirty = false;
        let mut executor_groups = vec![];
        let mut declutter_executor_groups = vec![];
        for source_tile in &source_tiles {
            if let Some(order) = render_order {
                if previous_order != Some(order.id()) {
                    source_tile
                        .write()
                        .sort_features(|a, b| order.compare(a, b));
                }
            }

            let source_tile = source_tile.read();
            if source_tile.state() != TileState::Loaded {
                continue;
            }

            let source_extent = source
                .tile_grid()
                .get_tile_coord_extent(&source_tile.tile_coord())?;
            let Some(shared_extent) = tile_extent.intersection(&source_extent) else {
                continue;
            };
            let builder_extent = shared_extent.buffer(render_buffer * resolution);
            let buffered_extent = (source_extent != shared_extent).then_some(builder_extent);

            let mut builder_group = BuilderGroup::new(Some(shared_extent), resolution, pixel_ratio);
            let mut declutter_group = declutter
                .then(|| BuilderGroup::new(Some(shared_extent), resolution, pixel_ratio));

            for feature in source_tile.features() {
                let in_extent = match &buffered_extent {
                    Some(extent) => feature
                        .geometry()
                        .bounding_rect()
                        .is_some_and(|bbox| bbox.intersects(extent)),
                    None => true,
                };
                if !in_extent {
                    continue;
                }

                let styles = match feature.style_function() {
                    Some(feature_style) => feature_style(feature.as_ref(), resolution),
                    None => style_function(feature.as_ref(), resolution),
                };
                for style in &styles {
                    self.track_icon(style);
                    dirty |= builder_group.add_feature(
                        feature,
                        squared_tolerance,
                        style,
                        declutter_group.as_mut(),
                    )?;
                }
            }

            let replay_extent = if self.layer.render_mode() != RenderMode::Vector
                && declutter
                && source_tiles.len() == 1
            {
                None
            } else {
                Some(shared_extent)
            };
            executor_groups.push(ExecutorGroup::new(
                replay_extent,
                resolution,
                pixel_ratio,
                source.overlaps(),
                builder_group.finish(),
                render_buffer,
            ));

            if let Some(mut declutter_group) = declutter_group {
                declutter_executor_groups.push(ExecutorGroup::new(
                    None,
                    resolution,
                    pixel_ratio,
                    source.overlaps(),
                    declutter_group.finish(),
                    render_buffer,
                ));
            }
        }

        tile.set_executor_groups(layer_id, executor_groups, declutter_executor_groups);
        let state = tile.builder_state_mut(layer_id);
        state.dirty = dirty;
        state.rendered_revision = Some(self.layer.revision());
        state.rendered_resolution = Some(resolution);
        state.rendered_render_order = render_order.map(|order| order.id());
        state.rendered_tile_revision = None;

        Ok(())
    }

    fn track_icon(&self, style: &Style) {
        let Some(ImageStyle::Icon(icon)) = &style.image else {
            return;
        };

        match icon.image.state() {
            IconState::Loaded | IconState::Error => icon.image.unlisten(self.layer.id()),
            IconState::Idle | IconState::Loading => {
                if let Some(messenger) = self.layer.messenger() {
                    icon.image.listen(self.layer.id(), messenger.clone());
                }
                icon.image.load();
            }
        }
    }

    fn render_order_id(&self) -> Option<crate::layer::RenderOrderId> {
        self.layer.render_order().map(|order| order.id())
    }

    fn is_drawable(&self, tile: &VectorRenderTile) -> bool {
        match tile.state() {
            TileState::Loaded => tile.has_executor_groups(self.layer.id()),
            TileState::Empty => true,
            _ => false,
        }
    }

    /// Adds the drawable tiles of the range to `tiles_by_z`. Returns true if every tile of the range was added.
    fn find_loaded_tiles(
        &self,
        source: &VectorTileSource,
        projection: &Projection,
        z: u32,
        range: &TileRange,
        tiles_by_z: &mut BTreeMap<u32, BTreeSet<TileCoord>>,
    ) -> bool {
        let mut covered = true;
        for tile_coord in range.iter_coords(z) {
            let loaded = source
                .cached_tile(tile_coord, projection)
                .is_some_and(|tile| {
                    let tile = tile.read();
                    tile.state() == TileState::Loaded && self.is_drawable(&tile)
                });

            if loaded {
                tiles_by_z.entry(z).or_default().insert(tile_coord);
            } else {
                covered = false;
            }
        }

        covered
    }

    fn tile_image_needs_render(&self, tile: &VectorRenderTile) -> bool {
        if self.layer.render_mode() == RenderMode::Vector {
            return false;
        }

        let state = tile.builder_state(self.layer.id());
        state.rendered_tile_resolution != tile.wanted_resolution()
            || state.rendered_tile_revision != Some(self.layer.revision())
    }

    fn render_tile_image(
        &self,
        tile: &mut VectorRenderTile,
        grid: &TileGrid,
        frame_state: &FrameState,
        surface: &dyn DrawingSurface,
    ) -> Result<(), MeridianError> {
        let (Some(wrapped), Some(wanted_resolution)) =
            (tile.wrapped_tile_coord(), tile.wanted_resolution())
        else {
            return Ok(());
        };

        let layer_id = self.layer.id();
        let frame_pixel_ratio = frame_state.pixel_ratio;
        let tile_resolution = grid.get_resolution(wrapped.z)?;
        let render_pixel_ratio = frame_pixel_ratio / wanted_resolution * tile_resolution;
        // Overzoomed tiles get more pixels to stay sharp.
        let pixel_ratio = frame_pixel_ratio
            .max(render_pixel_ratio / frame_pixel_ratio)
            .round()
            .max(1.0);
        let render_scale = pixel_ratio / render_pixel_ratio;

        let tile_size = grid.get_tile_size(wrapped.z)?;
        let width = (tile_size.width() * pixel_ratio).round() as u32;
        let height = (tile_size.height() * pixel_ratio).round() as u32;
        let extent = grid.get_tile_coord_extent(&wrapped)?;
        let pixel_scale = pixel_ratio / tile_resolution;
        let transform = Transform::scaling(pixel_scale, -pixel_scale)
            .multiply(&Transform::translation(-extent.x_min(), -extent.y_max()));

        let replays = self.layer.render_mode().image_replays();
        let groups = tile.executor_groups(layer_id);
        if groups.iter().any(|group| group.has_executors(replays)) {
            let mut image = surface.create_offscreen(width, height);
            for group in groups {
                group.execute(
                    image.as_mut(),
                    frame_pixel_ratio * render_scale,
                    &transform,
                    0.0,
                    true,
                    Some(replays),
                    None,
                );
            }
            tile.set_image(
                layer_id,
                TileImage {
                    surface: image,
                    transform,
                },
            );
        } else {
            tile.remove_image(layer_id);
        }

        let state = tile.builder_state_mut(layer_id);
        state.rendered_tile_revision = Some(self.layer.revision());
        state.rendered_tile_resolution = Some(wanted_resolution);

        Ok(())
    }

    fn render_tile_images(
        &self,
        tiles: &[Arc<RwLock<VectorRenderTile>>],
        grid: &TileGrid,
        target_z: u32,
        frame_state: &FrameState,
        surface: &mut dyn DrawingSurface,
    ) {
        let layer_id = self.layer.id();
        let mut clipper = TileClipper::new(target_z);
        for tile in tiles.iter().rev() {
            let mut tile = tile.write();
            if self.tile_image_needs_render(&tile) && frame_state.has_render_budget() {
                if let Err(err) = self.render_tile_image(&mut tile, grid, frame_state, surface) {
                    log::warn!("Failed to render image of tile {}: {err}", tile.tile_coord());
                }
            }

            let (Some(image), Some(wrapped)) = (tile.image(layer_id), tile.wrapped_tile_coord())
            else {
                continue;
            };
            let Ok(transform) = tile_render_transform(&tile, grid, frame_state) else {
                continue;
            };
            let Some(to_map) = image.transform.invert() else {
                continue;
            };

            let clip = grid
                .get_tile_coord_extent(&wrapped)
                .ok()
                .map(|extent| extent.into_quadrangle().map(|p| transform.apply(&p)));
            let saved = clipper.clip(surface, tile.tile_coord().z, clip);
            surface.draw_surface(image.surface.as_ref(), &transform.multiply(&to_map));
            if saved {
                surface.restore();
            }
        }
    }

    fn render_vectors(
        &self,
        tiles: &[Arc<RwLock<VectorRenderTile>>],
        grid: &TileGrid,
        target_z: u32,
        frame_state: &FrameState,
        surface: &mut dyn DrawingSurface,
    ) -> bool {
        let layer_id = self.layer.id();
        let replays = self.layer.render_mode().vector_replays();
        let mut clipper = TileClipper::new(target_z);
        let mut ready = true;
        for tile in tiles.iter().rev() {
            let tile = tile.read();
            ready &= !tile.builder_state(layer_id).dirty;

            let groups: Vec<&ExecutorGroup> = tile
                .executor_groups(layer_id)
                .iter()
                .filter(|group| group.has_executors(replays))
                .collect();
            let Some(first) = groups.first() else {
                continue;
            };
            let Ok(transform) = tile_render_transform(&tile, grid, frame_state) else {
                continue;
            };

            let saved = clipper.clip(surface, tile.tile_coord().z, first.get_clip_coords(&transform));
            for group in &groups {
                group.execute(
                    surface,
                    frame_state.pixel_ratio,
                    &transform,
                    frame_state.view.rotation(),
                    frame_state.is_hifi(),
                    Some(replays),
                    None,
                );
            }
            if saved {
                surface.restore();
            }
        }

        ready
    }
}

impl LayerRenderer for VectorTileLayerRenderer {
    fn prepare_frame(&mut self, frame_state: &FrameState) -> bool {
        let revision = self.layer.revision();
        if self.rendered_revision != Some(revision) {
            self.rendered_tiles.clear();
        }
        self.rendered_revision = Some(revision);

        match self.prepare_tiles(frame_state) {
            Ok(ready) => ready,
            Err(err) => {
                log::warn!("Failed to prepare layer {:?}: {err}", self.layer.id());
                false
            }
        }
    }

    fn render_frame(&mut self, frame_state: &FrameState, surface: &mut dyn DrawingSurface) {
        let view = &frame_state.view;
        let projection = view.projection();
        self.rendered_projection = Some(projection.clone());
        self.rendered_resolution = Some(view.resolution());
        self.rendered_rotation = view.rotation();
        self.rendered_pixel_to_coordinate = frame_state.pixel_to_coordinate_transform();

        let source = self.layer.source();
        let grid = match source.tile_grid_for_projection(projection) {
            Ok(grid) => grid,
            Err(err) => {
                log::warn!("Cannot render layer {:?}: {err}", self.layer.id());
                return;
            }
        };
        let target_z = grid.get_z_for_resolution(view.resolution(), source.z_direction());
        let tiles = self.rendered_tile_refs(projection);

        let alpha = surface.global_alpha();
        surface.set_global_alpha(self.layer.opacity());
        if self.layer.render_mode() != RenderMode::Vector {
            self.render_tile_images(&tiles, &grid, target_z, frame_state, surface);
        }
        self.ready = self.render_vectors(&tiles, &grid, target_z, frame_state, surface);
        surface.set_global_alpha(alpha);
    }

    fn for_each_feature_at_coordinate(
        &self,
        coordinate: &Point2,
        frame_state: &FrameState,
        hit_tolerance: f64,
        callback: &mut dyn FnMut(&HitMatch) -> bool,
        matches: &mut Vec<HitMatch>,
    ) -> bool {
        let view = &frame_state.view;
        let projection = view.projection();
        let source = self.layer.source();
        let Ok(grid) = source.tile_grid_for_projection(projection) else {
            return false;
        };

        let coordinate = if source.wrap_x() {
            wrap_coordinate_x(coordinate, projection)
        } else {
            *coordinate
        };
        let decluttered = self.layer.declutter().then(|| {
            frame_state
                .declutter_tree
                .as_ref()
                .map(DeclutterTree::features)
                .unwrap_or_default()
        });

        let layer_id = self.layer.id();
        let mut found: HashMap<FeatureKey, Option<usize>> = HashMap::new();
        let mut layer_matches: Vec<Option<HitMatch>> = vec![];
        let mut feature_callback = |feature: &Arc<Feature>, geometry: &Geom, distance_sq: f64| {
            let key = feature.key();
            let hit = HitMatch {
                feature: feature.clone(),
                layer: layer_id,
                geometry: geometry.clone(),
                distance_sq,
            };

            match found.get(&key).copied() {
                None => {
                    if distance_sq == 0.0 {
                        found.insert(key, None);
                        return callback(&hit);
                    }

                    found.insert(key, Some(layer_matches.len()));
                    layer_matches.push(Some(hit));
                    false
                }
                Some(None) => false,
                Some(Some(index)) => {
                    let Some(Some(existing)) = layer_matches.get_mut(index) else {
                        return false;
                    };
                    if distance_sq >= existing.distance_sq {
                        return false;
                    }

                    if distance_sq == 0.0 {
                        layer_matches[index] = None;
                        found.insert(key, None);
                        return callback(&hit);
                    }

                    *existing = hit;
                    false
                }
            }
        };

        let hit_extent = Rect::from_point(&coordinate).buffer(view.resolution() * hit_tolerance);
        for tile in self.rendered_tile_refs(projection).iter().rev() {
            let tile = tile.read();
            let Some(wrapped) = tile.wrapped_tile_coord() else {
                continue;
            };

            let in_range = grid
                .get_tile_coord_extent(&wrapped)
                .is_ok_and(|extent| extent.intersects(&hit_extent));
            if !in_range {
                continue;
            }

            for group in tile.executor_groups(layer_id) {
                if group.for_each_feature_at_coordinate(
                    &coordinate,
                    view.resolution(),
                    view.rotation(),
                    hit_tolerance,
                    &mut feature_callback,
                    None,
                ) {
                    return true;
                }
            }

            if let Some(decluttered) = &decluttered {
                for group in tile.declutter_executor_groups(layer_id) {
                    if group.for_each_feature_at_coordinate(
                        &coordinate,
                        view.resolution(),
                        view.rotation(),
                        hit_tolerance,
                        &mut feature_callback,
                        Some(decluttered),
                    ) {
                        return true;
                    }
                }
            }
        }

        matches.extend(layer_matches.into_iter().flatten());
        false
    }
}

/// Transform from the map coordinates of the wrapped tile to the device pixels of the frame, moved to the world
/// the tile is displayed in.
fn tile_render_transform(
    tile: &VectorRenderTile,
    grid: &TileGrid,
    frame_state: &FrameState,
) -> Result<Transform, MeridianError> {
    let tile_coord = tile.tile_coord();
    let wrapped = tile.wrapped_tile_coord().unwrap_or(tile_coord);
    let world_offset = grid.get_tile_coord_extent(&tile_coord)?.x_min()
        - grid.get_tile_coord_extent(&wrapped)?.x_min();

    let view = &frame_state.view;
    let (width, height) = frame_state.device_size();
    Ok(Transform::render_transform(
        &view.center(),
        view.resolution(),
        view.rotation(),
        frame_state.pixel_ratio,
        width,
        height,
        world_offset,
    ))
}

/// Clips tiles of lower zoom levels to the area not covered by higher zoom tiles drawn before them.
///
/// Tiles must be drawn from the highest zoom level down. Tiles of the target level of the frame are never clipped.
struct TileClipper {
    target_z: u32,
    clips: Vec<(u32, [Point2; 4])>,
}

impl TileClipper {
    fn new(target_z: u32) -> Self {
        Self {
            target_z,
            clips: vec![],
        }
    }

    /// Returns true if the surface state was saved and must be restored after the tile is drawn.
    fn clip(&mut self, surface: &mut dyn DrawingSurface, z: u32, clip: Option<[Point2; 4]>) -> bool {
        let Some(current) = clip else {
            return false;
        };

        let mut saved = false;
        if z != self.target_z {
            let current_bbox = Rect::from_points(current.iter());
            for (clip_z, occluder) in &self.clips {
                if z >= *clip_z {
                    continue;
                }

                let overlaps = match (current_bbox, Rect::from_points(occluder.iter())) {
                    (Some(a), Some(b)) => a.intersects(&b),
                    _ => false,
                };
                if !overlaps {
                    continue;
                }

                if !saved {
                    surface.save();
                    saved = true;
                }

                // Opposite ring orientation cuts the occluder out under the nonzero rule.
                let mut path = Path::from_ring(&current);
                path.add_ring(occluder.iter().rev().copied());
                surface.clip(&path);
            }
        }

        self.clips.push((z, current));
        saved
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use meridian_types::cartesian::Size;
    use meridian_types::{Contour, Polygon};

    use super::*;
    use crate::feature::FeatureId;
    use crate::layer::{RenderOrder, VectorTileLayerBuilder};
    use crate::render::RecordingSurface;
    use crate::renderer::for_each_feature_at_coordinate;
    use crate::style::{
        static_style, DecodedIcon, Fill, IconImage, IconLoader, IconStyle, Stroke, TextStyle,
    };
    use crate::tests::{
        empty_loader, settle, square_feature, test_grid, test_projection, CountingMessenger,
        FnTileLoader,
    };
    use crate::tile_grid::{create_xyz, XyzOptions};
    use crate::{Color, MapView};

    fn frame(center: Point2, resolution: f64, size: f64) -> FrameState {
        let view = MapView::new(center, resolution, test_projection())
            .with_size(Size::new(size, size));
        FrameState::new(view, 1.0)
    }

    fn pending_source() -> VectorTileSource {
        VectorTileSource::new(test_grid(), empty_loader()).with_wrap_x(false)
    }

    fn tile_feature(source: &VectorTileSource, tile_coord: TileCoord, color: Color) -> Feature {
        let extent = source
            .tile_grid()
            .get_tile_coord_extent(&tile_coord)
            .expect("tile extent");
        square_feature(extent).with_style(static_style(vec![
            Style::new().with_fill(Fill::new(color))
        ]))
    }

    fn renderer(source: VectorTileSource, render_mode: RenderMode) -> VectorTileLayerRenderer {
        let layer = VectorTileLayerBuilder::new(Arc::new(source))
            .with_render_mode(render_mode)
            .build();
        VectorTileLayerRenderer::new(layer)
    }

    #[test]
    fn loaded_tiles_are_built_and_drawn() {
        let source = pending_source();
        let coord = TileCoord::new(1, 0, 0);
        source.insert_loaded_tile(coord, vec![tile_feature(&source, coord, Color::RED)]);
        let mut renderer = renderer(source, RenderMode::Vector);

        let frame = frame(Point2::new(256.0, 768.0), 2.0, 256.0);
        assert!(renderer.prepare_frame(&frame));
        assert_eq!(renderer.rendered_tiles(), &[coord]);

        let mut surface = RecordingSurface::new(256, 256);
        renderer.render_frame(&frame, &mut surface);
        assert!(renderer.is_ready());
        assert_eq!(surface.color_at(&Point2::new(128.0, 128.0)), Color::RED);
        assert_eq!(surface.saved_states(), 0);
    }

    #[test]
    fn tiles_are_rebuilt_after_layer_change() {
        let source = pending_source();
        let coord = TileCoord::new(1, 0, 0);
        source.insert_loaded_tile(coord, vec![tile_feature(&source, coord, Color::RED)]);
        let mut renderer = renderer(source, RenderMode::Vector);
        let frame = frame(Point2::new(256.0, 768.0), 2.0, 256.0);
        renderer.prepare_frame(&frame);

        let tile = renderer
            .layer()
            .source()
            .cached_tile(coord, &test_projection())
            .expect("cached tile");
        let layer_id = renderer.layer().id();
        assert_eq!(tile.read().builder_state(layer_id).rendered_revision, Some(0));

        renderer
            .layer_mut()
            .set_style(Some(static_style(vec![Style::new()])));
        renderer.prepare_frame(&frame);
        assert_eq!(tile.read().builder_state(layer_id).rendered_revision, Some(1));
    }

    #[test]
    fn lower_zoom_tiles_are_clipped_by_higher_zoom_tiles() {
        for render_mode in [RenderMode::Vector, RenderMode::Image] {
            let source = pending_source();
            let parent = TileCoord::new(1, 0, 0);
            source.insert_loaded_tile(parent, vec![tile_feature(&source, parent, Color::BLUE)]);
            let children = [
                TileCoord::new(2, 0, 0),
                TileCoord::new(2, 1, 0),
                TileCoord::new(2, 0, 1),
            ];
            for child in children {
                source.insert_loaded_tile(child, vec![tile_feature(&source, child, Color::RED)]);
            }
            let mut renderer = renderer(source, render_mode);

            let parent_frame = frame(Point2::new(256.0, 768.0), 2.0, 256.0);
            assert!(renderer.prepare_frame(&parent_frame));

            // Tile 2/1/1 is never loaded, the parent tile is drawn in its place.
            let child_frame = frame(Point2::new(256.0, 768.0), 1.0, 512.0);
            assert!(!renderer.prepare_frame(&child_frame));
            let mut expected = vec![parent];
            expected.extend(children);
            expected.sort();
            assert_eq!(renderer.rendered_tiles(), &expected[..]);

            let mut surface = RecordingSurface::new(512, 512);
            renderer.render_frame(&child_frame, &mut surface);

            // Pixels of the frame: tile 2/0/0 is top left, tile 2/1/1 is bottom right.
            assert_eq!(surface.color_at(&Point2::new(100.0, 100.0)), Color::RED);
            assert_eq!(surface.color_at(&Point2::new(400.0, 100.0)), Color::RED);
            assert_eq!(surface.color_at(&Point2::new(100.0, 400.0)), Color::RED);
            assert_eq!(surface.color_at(&Point2::new(400.0, 400.0)), Color::BLUE);
            assert_eq!(surface.saved_states(), 0);
        }
    }

    #[test]
    fn error_tiles_are_substituted() {
        crate::tests::init_logger();
        let source = VectorTileSource::new(
            test_grid(),
            Arc::new(FnTileLoader(
                |tile_coord: TileCoord| -> Result<Vec<Feature>, MeridianError> {
                    Err(MeridianError::ResourceLoad(tile_coord.to_string()))
                },
            )),
        )
        .with_wrap_x(false);
        let parent = TileCoord::new(1, 0, 0);
        source.insert_loaded_tile(parent, vec![tile_feature(&source, parent, Color::BLUE)]);
        let mut renderer = renderer(source, RenderMode::Vector);
        renderer.prepare_frame(&frame(Point2::new(256.0, 768.0), 2.0, 256.0));

        tokio_test::block_on(async {
            let child_frame = frame(Point2::new(128.0, 896.0), 1.0, 256.0);
            renderer.prepare_frame(&child_frame);
            let tile = renderer
                .layer()
                .source()
                .cached_tile(TileCoord::new(2, 0, 0), &test_projection())
                .expect("cached tile");
            crate::tests::settle(|| tile.read().state().is_settled()).await;
            assert_eq!(tile.read().state(), TileState::Error);

            assert!(renderer.prepare_frame(&child_frame));
            assert_eq!(renderer.rendered_tiles(), &[parent]);

            let mut surface = RecordingSurface::new(256, 256);
            renderer.render_frame(&child_frame, &mut surface);
            assert_eq!(surface.color_at(&Point2::new(128.0, 128.0)), Color::BLUE);
        });
    }

    #[test]
    fn exact_hit_short_circuits() {
        let source = pending_source();
        let coord = TileCoord::new(1, 0, 0);
        let vertex = Point2::new(200.0, 700.0);
        let square = Feature::new(Polygon::new(
            Contour::closed(vec![
                vertex,
                Point2::new(100.0, 700.0),
                Point2::new(100.0, 600.0),
                Point2::new(200.0, 600.0),
            ]),
            vec![],
        ))
        .with_id("square")
        .with_style(static_style(vec![
            Style::new().with_stroke(Stroke::new(Color::BLUE, 1.0))
        ]));
        let line = Feature::new(Geom::LineString(Contour::open(vec![
            Point2::new(210.0, 690.0),
            Point2::new(210.0, 710.0),
        ])))
        .with_id("line")
        .with_style(static_style(vec![Style::new()
            .with_stroke(Stroke::new(Color::RED, 1.0))
            .with_z_index(1)]));
        source.insert_loaded_tile(coord, vec![square, line]);

        let mut renderer = renderer(source, RenderMode::Vector);
        let frame = frame(Point2::new(256.0, 768.0), 2.0, 256.0);
        renderer.prepare_frame(&frame);
        let mut surface = RecordingSurface::new(256, 256);
        renderer.render_frame(&frame, &mut surface);

        let mut hits = vec![];
        let found = for_each_feature_at_coordinate(
            &[&renderer],
            &vertex,
            &frame,
            10.0,
            &mut |hit: &HitMatch| {
                hits.push((hit.feature.id().cloned(), hit.distance_sq));
                true
            },
        );

        assert!(found);
        assert_eq!(hits, vec![(Some("square".into()), 0.0)]);
    }

    #[test]
    fn near_hits_are_sorted_by_distance() {
        let source = pending_source();
        let coord = TileCoord::new(1, 0, 0);
        let near = Feature::new(Geom::LineString(Contour::open(vec![
            Point2::new(104.0, 600.0),
            Point2::new(104.0, 800.0),
        ])))
        .with_id("near");
        let far = Feature::new(Geom::LineString(Contour::open(vec![
            Point2::new(90.0, 600.0),
            Point2::new(90.0, 800.0),
        ])))
        .with_id("far");
        source.insert_loaded_tile(coord, vec![near, far]);

        let layer = VectorTileLayerBuilder::new(Arc::new(source))
            .with_render_mode(RenderMode::Vector)
            .with_style(static_style(vec![
                Style::new().with_stroke(Stroke::new(Color::BLUE, 2.0))
            ]))
            .build();
        let mut renderer = VectorTileLayerRenderer::new(layer);
        let frame = frame(Point2::new(256.0, 768.0), 2.0, 256.0);
        renderer.prepare_frame(&frame);
        let mut surface = RecordingSurface::new(256, 256);
        renderer.render_frame(&frame, &mut surface);

        let mut hits = vec![];
        let found = for_each_feature_at_coordinate(
            &[&renderer],
            &Point2::new(100.0, 700.0),
            &frame,
            10.0,
            &mut |hit: &HitMatch| {
                hits.push(hit.feature.id().cloned());
                false
            },
        );

        assert!(!found);
        assert_eq!(hits, vec![Some("near".into()), Some("far".into())]);
    }

    #[test]
    fn hits_across_tile_edge() {
        let source = pending_source();
        source.insert_loaded_tile(TileCoord::new(1, 0, 0), vec![]);
        let line = Feature::new(Geom::LineString(Contour::open(vec![
            Point2::new(514.0, 600.0),
            Point2::new(514.0, 800.0),
        ])))
        .with_id("edge");
        source.insert_loaded_tile(TileCoord::new(1, 1, 0), vec![line]);

        let layer = VectorTileLayerBuilder::new(Arc::new(source))
            .with_render_mode(RenderMode::Vector)
            .with_style(static_style(vec![
                Style::new().with_stroke(Stroke::new(Color::BLUE, 1.0))
            ]))
            .build();
        let mut renderer = VectorTileLayerRenderer::new(layer);
        let frame = frame(Point2::new(512.0, 768.0), 2.0, 512.0);
        renderer.prepare_frame(&frame);
        assert_eq!(
            renderer.rendered_tiles(),
            &[TileCoord::new(1, 0, 0), TileCoord::new(1, 1, 0)]
        );
        let mut surface = RecordingSurface::new(512, 512);
        renderer.render_frame(&frame, &mut surface);

        let mut hits = vec![];
        for_each_feature_at_coordinate(
            &[&renderer],
            &Point2::new(510.0, 700.0),
            &frame,
            10.0,
            &mut |hit: &HitMatch| {
                hits.push(hit.feature.id().cloned());
                false
            },
        );
        assert_eq!(hits, vec![Some("edge".into())]);

        let mut far_hits = 0;
        for_each_feature_at_coordinate(
            &[&renderer],
            &Point2::new(470.0, 700.0),
            &frame,
            10.0,
            &mut |_: &HitMatch| {
                far_hits += 1;
                false
            },
        );
        assert_eq!(far_hits, 0);
    }

    struct YieldingIconLoader;

    #[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
    #[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
    impl IconLoader for YieldingIconLoader {
        async fn load(&self, _src: &str) -> Result<DecodedIcon, MeridianError> {
            tokio::task::yield_now().await;
            DecodedIcon::from_raw(vec![255; 2 * 2 * 4], 2, 2)
        }
    }

    #[test]
    fn tile_is_rebuilt_after_icon_loads() {
        tokio_test::block_on(async {
            let icon = Arc::new(IconImage::new("pin", Arc::new(YieldingIconLoader)));
            let source = pending_source();
            let coord = TileCoord::new(1, 0, 0);
            let pin = Feature::new(Point2::new(256.0, 768.0)).with_style(static_style(vec![
                Style::new().with_image(ImageStyle::Icon(IconStyle::new(icon.clone()))),
            ]));
            source.insert_loaded_tile(coord, vec![pin]);

            let messenger = Arc::new(CountingMessenger::default());
            let layer = VectorTileLayerBuilder::new(Arc::new(source))
                .with_render_mode(RenderMode::Vector)
                .with_messenger(messenger.clone())
                .build();
            let layer_id = layer.id();
            let mut renderer = VectorTileLayerRenderer::new(layer);
            let frame = frame(Point2::new(256.0, 768.0), 2.0, 256.0);

            assert!(!renderer.prepare_frame(&frame));
            let tile = renderer
                .layer()
                .source()
                .cached_tile(coord, &test_projection())
                .expect("cached tile");
            assert!(tile.read().builder_state(layer_id).dirty);
            assert_eq!(icon.listener_count(), 1);

            settle(|| icon.state() == IconState::Loaded).await;
            assert_eq!(icon.state(), IconState::Loaded);
            assert_eq!(messenger.count(), 1);

            assert!(renderer.prepare_frame(&frame));
            assert!(!tile.read().builder_state(layer_id).dirty);
            assert_eq!(icon.listener_count(), 0);

            let mut surface = RecordingSurface::new(256, 256);
            renderer.render_frame(&frame, &mut surface);
            assert!(renderer.is_ready());
            assert_eq!(surface.icons().count(), 1);
        });
    }

    #[test]
    fn features_are_sorted_by_render_order() {
        let source = pending_source();
        let coord = TileCoord::new(1, 0, 0);
        source.insert_loaded_tile(
            coord,
            vec![
                tile_feature(&source, coord, Color::RED).with_id("a"),
                tile_feature(&source, coord, Color::BLUE).with_id("b"),
            ],
        );
        let ascending = RenderOrder::new(|a: &Feature, b: &Feature| a.id().cmp(&b.id()));
        let layer = VectorTileLayerBuilder::new(Arc::new(source))
            .with_render_mode(RenderMode::Vector)
            .with_render_order(ascending)
            .build();
        let layer_id = layer.id();
        let mut renderer = VectorTileLayerRenderer::new(layer);
        let frame = frame(Point2::new(256.0, 768.0), 2.0, 256.0);
        let center = Point2::new(128.0, 128.0);

        assert!(renderer.prepare_frame(&frame));
        let mut surface = RecordingSurface::new(256, 256);
        renderer.render_frame(&frame, &mut surface);
        assert_eq!(surface.color_at(&center), Color::BLUE);

        let descending = RenderOrder::new(|a: &Feature, b: &Feature| b.id().cmp(&a.id()));
        let descending_id = descending.id();
        renderer.layer_mut().set_render_order(Some(descending));
        assert!(renderer.prepare_frame(&frame));

        let tile = renderer
            .layer()
            .source()
            .cached_tile(coord, &test_projection())
            .expect("cached tile");
        assert_eq!(
            tile.read().builder_state(layer_id).rendered_render_order,
            Some(descending_id)
        );

        let mut surface = RecordingSurface::new(256, 256);
        renderer.render_frame(&frame, &mut surface);
        assert_eq!(surface.color_at(&center), Color::RED);
    }

    #[test]
    fn features_outside_render_buffer_are_skipped() {
        let grid = create_xyz(
            XyzOptions::default()
                .with_extent(Rect::new(0.0, 0.0, 1024.0, 1024.0))
                .with_max_zoom(1),
        )
        .expect("valid grid");
        let source = VectorTileSource::new(grid, empty_loader()).with_wrap_x(false);
        source.insert_loaded_tile(
            TileCoord::new(1, 0, 0),
            vec![
                square_feature(Rect::new(262.0, 890.0, 270.0, 898.0)).with_id("buffered"),
                square_feature(Rect::new(390.0, 890.0, 410.0, 910.0)).with_id("outside"),
            ],
        );
        let layer = VectorTileLayerBuilder::new(Arc::new(source))
            .with_render_mode(RenderMode::Vector)
            .with_render_buffer(10.0)
            .build();
        let layer_id = layer.id();
        let mut renderer = VectorTileLayerRenderer::new(layer);

        // Render tile 2/0/0 at resolution 1 is a quarter of source tile 1/0/0.
        let frame = frame(Point2::new(128.0, 896.0), 1.0, 256.0);
        assert!(renderer.prepare_frame(&frame));
        assert_eq!(renderer.rendered_tiles(), &[TileCoord::new(2, 0, 0)]);

        let tile = renderer
            .layer()
            .source()
            .cached_tile(TileCoord::new(2, 0, 0), &test_projection())
            .expect("cached tile");
        let tile = tile.read();
        let features_at = |point: Point2| {
            let mut ids = vec![];
            for group in tile.executor_groups(layer_id) {
                group.for_each_feature_at_coordinate(
                    &point,
                    1.0,
                    0.0,
                    0.0,
                    &mut |feature: &Arc<Feature>, _: &Geom, _: f64| {
                        ids.push(feature.id().cloned());
                        false
                    },
                    None,
                );
            }
            ids
        };

        assert_eq!(features_at(Point2::new(266.0, 894.0)), vec![Some("buffered".into())]);
        assert!(features_at(Point2::new(400.0, 900.0)).is_empty());
    }

    #[test]
    fn get_features_at_pixel() {
        let source = pending_source();
        let coord = TileCoord::new(1, 0, 0);
        source.insert_loaded_tile(
            coord,
            vec![tile_feature(&source, coord, Color::RED).with_id(7i64)],
        );
        let mut renderer = renderer(source, RenderMode::Hybrid);
        let frame = frame(Point2::new(256.0, 768.0), 2.0, 256.0);
        renderer.prepare_frame(&frame);
        let mut surface = RecordingSurface::new(256, 256);
        renderer.render_frame(&frame, &mut surface);

        let features = tokio_test::block_on(renderer.get_features(&Point2::new(128.0, 128.0)));
        assert_eq!(features.len(), 1);
        assert_matches!(features[0].id(), Some(FeatureId::Int(7)));

        let outside = tokio_test::block_on(renderer.get_features(&Point2::new(1000.0, 128.0)));
        assert!(outside.is_empty());
    }

    #[test]
    fn labels_are_decluttered() {
        let source = pending_source();
        let coord = TileCoord::new(1, 0, 0);
        let label = |id: &str| {
            Feature::new(Point2::new(256.0, 768.0))
                .with_id(id)
                .with_style(static_style(vec![
                    Style::new().with_text(TextStyle::new("label", 10.0))
                ]))
        };
        source.insert_loaded_tile(coord, vec![label("first"), label("second")]);

        let layer = VectorTileLayerBuilder::new(Arc::new(source))
            .with_declutter(true)
            .build();
        let mut renderer = VectorTileLayerRenderer::new(layer);
        let mut frame = frame(Point2::new(256.0, 768.0), 2.0, 256.0).with_declutter();
        renderer.prepare_frame(&frame);
        let mut surface = RecordingSurface::new(256, 256);
        renderer.render_frame(&frame, &mut surface);
        assert_eq!(surface.texts().count(), 0);

        renderer.render_declutter(&mut frame, &mut surface);
        assert_eq!(surface.texts().count(), 1);
        assert_eq!(frame.declutter_tree.as_ref().map(DeclutterTree::len), Some(1));

        let calls = AtomicUsize::new(0);
        for_each_feature_at_coordinate(
            &[&renderer],
            &Point2::new(256.0, 768.0),
            &frame,
            0.0,
            &mut |_: &HitMatch| {
                calls.fetch_add(1, Ordering::Relaxed);
                false
            },
        );
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
