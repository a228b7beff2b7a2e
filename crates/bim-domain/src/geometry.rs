// geometry.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerancia para comparar coordenadas (unidades del modelo).
pub const COORD_TOLERANCE: f64 = 1e-6;

/// Punto 2D en planta. Las unidades son las del modelo destino; el dominio no
/// las interpreta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    /// Punto medio del segmento `self`-`other`.
    pub fn midpoint(&self, other: &Point2) -> Point2 {
        Point2 { x: (self.x + other.x) / 2.0,
                 y: (self.y + other.y) / 2.0 }
    }

    pub fn approx_eq(&self, other: &Point2) -> bool {
        (self.x - other.x).abs() < COORD_TOLERANCE && (self.y - other.y).abs() < COORD_TOLERANCE
    }
}

impl fmt::Display for Point2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Aristas de un polígono cerrado (el último vértice conecta con el primero).
pub fn closed_edges(points: &[Point2]) -> Vec<(Point2, Point2)> {
    if points.len() < 2 {
        return Vec::new();
    }
    points.iter()
          .enumerate()
          .map(|(i, p)| (*p, points[(i + 1) % points.len()]))
          .collect()
}

/// Área con signo (fórmula del shoelace). Positiva para orden antihorario.
pub fn signed_area(points: &[Point2]) -> f64 {
    closed_edges(points).iter()
                        .map(|(a, b)| a.x * b.y - b.x * a.y)
                        .sum::<f64>()
           / 2.0
}

/// Centroide simple (promedio de vértices). Suficiente para ubicar etiquetas
/// o puntos de colocación; no es el centroide de área.
pub fn vertex_centroid(points: &[Point2]) -> Option<Point2> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point2 { x: sx / n, y: sy / n })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point2> {
        vec![Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(10.0, 10.0), Point2::new(0.0, 10.0)]
    }

    #[test]
    fn closed_edges_wraps_to_first_vertex() {
        let edges = closed_edges(&square());
        assert_eq!(edges.len(), 4);
        assert!(edges[3].1.approx_eq(&Point2::new(0.0, 0.0)));
    }

    #[test]
    fn signed_area_of_ccw_square_is_positive() {
        assert!((signed_area(&square()) - 100.0).abs() < COORD_TOLERANCE);
        let mut cw = square();
        cw.reverse();
        assert!(signed_area(&cw) < 0.0);
    }

    #[test]
    fn vertex_centroid_of_square() {
        let c = vertex_centroid(&square()).expect("centroid");
        assert!(c.approx_eq(&Point2::new(5.0, 5.0)));
        assert!(vertex_centroid(&[]).is_none());
    }
}
