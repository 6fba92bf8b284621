use super::CoverLetterRequest;

/// German instruction prompt for one cover letter
pub fn cover_letter_prompt(request: &CoverLetterRequest) -> String {
    format!(
        "Du bist ein professioneller Karriereberater.\n\
         Erstelle auf Basis der folgenden Informationen ein überzeugendes, individuelles Anschreiben auf Deutsch.\n\
         \n\
         ## Lebenslauf:\n\
         {cv}\n\
         \n\
         ## Muster-Anschreiben (Stil & Ton übernehmen):\n\
         {sample}\n\
         \n\
         ## Stellenausschreibung:\n\
         {listing}\n\
         \n\
         ## Regeln:\n\
         - Passe das Anschreiben exakt an die Anforderungen der Stelle an.\n\
         - Übernimm denselben Stil wie im Muster-Anschreiben.\n\
         - Hebe die relevantesten Qualifikationen hervor.\n\
         - Max. eine DIN-A4-Seite (ca. 300–400 Wörter).\n\
         - Struktur: Ort/Datum, Betreff, Anrede, 3–4 Absätze, Grußformel.\n\
         - Nur das fertige Anschreiben ausgeben, ohne Kommentare.\n",
        cv = request.reference_document,
        sample = request.style_sample,
        listing = request.listing_text,
    )
}
